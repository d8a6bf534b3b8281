use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrivilegeError {
    #[cfg(windows)]
    #[error("Migration writes machine-wide variables; run from an elevated (Administrator) prompt")]
    NeedElevation,
    #[cfg(not(windows))]
    #[error("Migration writes /etc/environment; run again with sudo")]
    NeedElevation,
}

/// Whether the process may write the system-scope environment.
#[cfg(unix)]
pub fn is_elevated() -> bool {
    matches!(sudo::check(), sudo::RunningAs::Root)
}

/// `net session` only succeeds from an elevated token.
#[cfg(windows)]
pub fn is_elevated() -> bool {
    duct::cmd!("net", "session")
        .stdout_null()
        .stderr_null()
        .unchecked()
        .run()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(not(any(unix, windows)))]
pub fn is_elevated() -> bool {
    false
}

pub fn require_elevation() -> Result<(), PrivilegeError> {
    if is_elevated() {
        Ok(())
    } else {
        Err(PrivilegeError::NeedElevation)
    }
}
