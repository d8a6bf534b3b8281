//! Deciding whether two paths live on the same volume.
//!
//! Verification compares volumes rather than strings so that trailing
//! separators, letter case and sub-directories of the target root all count
//! as "on the destination volume".

use serde::Serialize;
use std::path::{Component, Path, Prefix};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum VolumeId {
    /// Drive letter or UNC share, upper-cased (`D:`, `\\SERVER\SHARE`).
    Prefix(String),
    /// Device number of the filesystem holding the path.
    Device(u64),
}

/// Identify the volume `path` resolves onto.
///
/// Paths with a Windows prefix are identified lexically. Otherwise the
/// nearest existing ancestor is stat'ed, so a not-yet-created target still
/// maps to the filesystem it would be created on.
pub fn volume_of(path: &Path) -> Option<VolumeId> {
    if let Some(id) = prefix_id(path) {
        return Some(id);
    }
    device_id(path)
}

pub fn same_volume(a: &Path, b: &Path) -> bool {
    match (volume_of(a), volume_of(b)) {
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

fn prefix_id(path: &Path) -> Option<VolumeId> {
    match path.components().next()? {
        Component::Prefix(prefix) => {
            let id = match prefix.kind() {
                Prefix::Disk(letter) | Prefix::VerbatimDisk(letter) => {
                    format!("{}:", (letter as char).to_ascii_uppercase())
                }
                Prefix::UNC(server, share) | Prefix::VerbatimUNC(server, share) => format!(
                    r"\\{}\{}",
                    server.to_string_lossy().to_uppercase(),
                    share.to_string_lossy().to_uppercase()
                ),
                _ => prefix.as_os_str().to_string_lossy().to_uppercase(),
            };
            Some(VolumeId::Prefix(id))
        }
        _ => None,
    }
}

#[cfg(unix)]
fn device_id(path: &Path) -> Option<VolumeId> {
    use std::os::unix::fs::MetadataExt;

    if !path.is_absolute() {
        return None;
    }
    path.ancestors()
        .find_map(|ancestor| std::fs::metadata(ancestor).ok())
        .map(|metadata| VolumeId::Device(metadata.dev()))
}

#[cfg(not(unix))]
fn device_id(_path: &Path) -> Option<VolumeId> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths_have_no_volume() {
        assert_eq!(volume_of(Path::new("relative/cache")), None);
        assert!(!same_volume(Path::new("a"), Path::new("a")));
    }

    #[cfg(unix)]
    #[test]
    fn missing_children_resolve_to_existing_ancestor() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("not/yet/created");
        assert!(same_volume(dir.path(), &missing));
        assert!(same_volume(&missing, &dir.path().join("other/")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn proc_is_a_different_volume() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!same_volume(dir.path(), Path::new("/proc/devcache-test")));
    }

    #[cfg(windows)]
    #[test]
    fn drive_letters_compare_case_insensitively() {
        assert!(same_volume(Path::new(r"d:\packages\"), Path::new(r"D:\other")));
        assert!(same_volume(Path::new(r"\\?\D:\packages"), Path::new(r"D:\x")));
        assert!(!same_volume(Path::new(r"C:\Users"), Path::new(r"D:\packages")));
        assert_eq!(
            volume_of(Path::new(r"\\server\share\cache")),
            Some(VolumeId::Prefix(r"\\SERVER\SHARE".into()))
        );
    }
}
