/// Nerd Font icons used in devcache output.
///
/// A curated set rather than the full nerd_fonts table: every glyph here is
/// available in the common patched fonts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerdFont {
    // Status and feedback
    Check,
    Cross,
    Warning,
    Info,

    // Files and storage
    Folder,
    HardDrive,
    Package,
    Trash,

    // Actions
    ArrowRight,
    Search,
    Key,
}

impl NerdFont {
    pub const fn unicode(&self) -> char {
        match self {
            Self::Check => '\u{f00c}',       // fa-check
            Self::Cross => '\u{f00d}',       // fa-times
            Self::Warning => '\u{f071}',     // fa-exclamation-triangle
            Self::Info => '\u{f05a}',        // fa-info-circle
            Self::Folder => '\u{f07b}',      // fa-folder
            Self::HardDrive => '\u{f0a0}',   // fa-hdd
            Self::Package => '\u{f187}',     // fa-archive
            Self::Trash => '\u{f1f8}',       // fa-trash
            Self::ArrowRight => '\u{f061}',  // fa-arrow-right
            Self::Search => '\u{f002}',      // fa-search
            Self::Key => '\u{f084}',         // fa-key
        }
    }
}

impl From<NerdFont> for char {
    fn from(icon: NerdFont) -> Self {
        icon.unicode()
    }
}

impl From<NerdFont> for String {
    fn from(icon: NerdFont) -> Self {
        icon.unicode().to_string()
    }
}
