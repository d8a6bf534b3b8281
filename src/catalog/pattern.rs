//! Path patterns used by descriptors: `~`, `$VAR` / `${VAR}` and glob wildcards.

use std::path::PathBuf;

/// Expand `~` and environment variables in a pattern.
///
/// Returns `None` when the pattern references a variable that is not set on
/// this machine: such a pattern can never match anything.
pub fn expand(pattern: &str) -> Option<String> {
    shellexpand::full(pattern).ok().map(|s| s.into_owned())
}

/// All existing filesystem entries matching `pattern`, sorted.
///
/// Unset variables, invalid glob syntax and unreadable entries all yield an
/// empty list; "nothing there" is an ordinary answer here.
pub fn existing_matches(pattern: &str) -> Vec<PathBuf> {
    let Some(expanded) = expand(pattern) else {
        return Vec::new();
    };

    if !has_wildcards(&expanded) {
        let path = PathBuf::from(&expanded);
        return if path.exists() { vec![path] } else { Vec::new() };
    }

    let Ok(paths) = glob::glob(&expanded) else {
        return Vec::new();
    };
    let mut matches: Vec<PathBuf> = paths.filter_map(Result::ok).collect();
    matches.sort();
    matches
}

fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}
