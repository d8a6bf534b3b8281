use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

use super::{EnvStore, validate_value};
use crate::error::EngineError;

/// System-wide variables in a pam_env style `KEY=VALUE` file.
///
/// Updates rewrite the whole file into a temporary sibling and rename it over
/// the original, so readers never see a half-written file.
#[derive(Debug, Clone)]
pub struct EnvironmentFileStore {
    path: PathBuf,
}

impl EnvironmentFileStore {
    pub const SYSTEM_PATH: &'static str = "/etc/environment";

    pub fn system() -> Self {
        Self::at(Self::SYSTEM_PATH)
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> io::Result<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e),
        }
    }

    fn write_atomically(&self, contents: &str) -> io::Result<()> {
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut tmp = NamedTempFile::new_in(parent)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        match fs::metadata(&self.path) {
            Ok(metadata) => fs::set_permissions(tmp.path(), metadata.permissions())?,
            // NamedTempFile creates 0600; every user reads this file
            Err(_) => set_default_mode(tmp.path())?,
        }
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_default_mode(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn set_default_mode(_path: &Path) -> io::Result<()> {
    Ok(())
}

impl EnvStore for EnvironmentFileStore {
    fn location(&self) -> String {
        self.path.display().to_string()
    }

    fn get(&self, name: &str) -> Result<Option<String>, EngineError> {
        let contents = self.read().map_err(|e| EngineError::EnvReadFailed {
            name: name.to_string(),
            reason: format!("{}: {}", self.path.display(), e),
        })?;
        Ok(lookup(&contents, name).filter(|v| !v.trim().is_empty()))
    }

    fn set(&self, name: &str, value: &str) -> Result<(), EngineError> {
        validate_value(name, value)?;
        let write_failed = |e: io::Error| EngineError::EnvWriteFailed {
            name: name.to_string(),
            reason: format!("{}: {}", self.path.display(), e),
        };

        let contents = self.read().map_err(write_failed)?;
        let updated = assign(&contents, name, value);
        self.write_atomically(&updated).map_err(write_failed)
    }
}

/// Split an assignment line into (name, raw value).
fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let trimmed = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, value) = trimmed.split_once('=')?;
    Some((key.trim(), value.trim()))
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

fn quote(value: &str) -> String {
    if value.is_empty() || value.chars().any(|c| c.is_whitespace() || c == '#') {
        format!("\"{}\"", value)
    } else {
        value.to_string()
    }
}

/// Last assignment wins, matching pam_env.
fn lookup(contents: &str, name: &str) -> Option<String> {
    contents
        .lines()
        .filter_map(parse_line)
        .filter(|(key, _)| *key == name)
        .last()
        .map(|(_, value)| unquote(value).to_string())
}

/// Replace the first assignment of `name`, drop any later ones, or append.
fn assign(contents: &str, name: &str, value: &str) -> String {
    let new_line = format!("{}={}", name, quote(value));
    let mut out = Vec::new();
    let mut written = false;

    for line in contents.lines() {
        if parse_line(line).is_some_and(|(key, _)| key == name) {
            if !written {
                out.push(new_line.clone());
                written = true;
            }
            continue;
        }
        out.push(line.to_string());
    }
    if !written {
        out.push(new_line);
    }

    let mut result = out.join("\n");
    result.push('\n');
    result
}
