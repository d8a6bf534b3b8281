use duct::cmd;
use regex::Regex;

use super::{EnvStore, validate_value};
use crate::error::EngineError;

const ENVIRONMENT_KEY: &str =
    r"HKLM\SYSTEM\CurrentControlSet\Control\Session Manager\Environment";

/// Machine-wide variables in the Windows registry, through `reg.exe`.
///
/// `reg add` replaces a single value in one registry write. New values only
/// reach processes started after the change (or after a sign-out).
#[derive(Debug, Clone, Copy, Default)]
pub struct RegistryEnvStore;

impl EnvStore for RegistryEnvStore {
    fn location(&self) -> String {
        ENVIRONMENT_KEY.to_string()
    }

    fn get(&self, name: &str) -> Result<Option<String>, EngineError> {
        let output = cmd!("reg", "query", ENVIRONMENT_KEY, "/v", name)
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()
            .map_err(|e| EngineError::EnvReadFailed {
                name: name.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_missing_value(&stderr) {
                return Ok(None);
            }
            return Err(EngineError::EnvReadFailed {
                name: name.to_string(),
                reason: format!("reg query exited with {}: {}", output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_query_output(&stdout, name)
            .map(|(_, value)| value)
            .filter(|v| !v.trim().is_empty()))
    }

    fn set(&self, name: &str, value: &str) -> Result<(), EngineError> {
        validate_value(name, value)?;
        let kind = if value.contains('%') {
            "REG_EXPAND_SZ"
        } else {
            "REG_SZ"
        };

        let output = cmd!(
            "reg",
            "add",
            ENVIRONMENT_KEY,
            "/v",
            name,
            "/t",
            kind,
            "/d",
            value,
            "/f"
        )
        .stdout_capture()
        .stderr_capture()
        .unchecked()
        .run()
        .map_err(|e| EngineError::EnvWriteFailed {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(EngineError::EnvWriteFailed {
                name: name.to_string(),
                reason: stderr.trim().to_string(),
            })
        }
    }
}

/// `reg query` reports an absent value as "unable to find"; anything else
/// (access denied, a broken key) is a real read failure.
pub(crate) fn is_missing_value(stderr: &str) -> bool {
    stderr.to_ascii_lowercase().contains("unable to find")
}

/// Extract `(type, value)` for `name` from `reg query` output.
///
/// Lines look like `    NAME    REG_SZ    value`; names compare
/// case-insensitively like the registry does.
pub(crate) fn parse_query_output(stdout: &str, name: &str) -> Option<(String, String)> {
    let line_re = Regex::new(r"^\s+(\S+)\s+(REG_[A-Z_]+)\s*(.*)$").ok()?;

    stdout.lines().find_map(|line| {
        let caps = line_re.captures(line.trim_end_matches('\r'))?;
        if !caps[1].eq_ignore_ascii_case(name) {
            return None;
        }
        Some((caps[2].to_string(), caps[3].trim_end().to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const OUTPUT: &str = concat!(
        "\r\n",
        "HKEY_LOCAL_MACHINE\\SYSTEM\\CurrentControlSet\\Control\\Session Manager\\Environment\r\n",
        "    NUGET_PACKAGES    REG_SZ    D:\\packages\\nuget\\packages\r\n",
        "\r\n",
    );

    #[test]
    fn parses_value_line() {
        assert_eq!(
            parse_query_output(OUTPUT, "nuget_packages"),
            Some((
                "REG_SZ".to_string(),
                r"D:\packages\nuget\packages".to_string()
            ))
        );
    }

    #[test]
    fn ignores_other_names_and_header() {
        assert_eq!(parse_query_output(OUTPUT, "NPM_CONFIG_CACHE"), None);
        assert_eq!(parse_query_output("", "NUGET_PACKAGES"), None);
    }

    #[test]
    fn keeps_spaces_inside_values() {
        let out = concat!(
            "    MAVEN_OPTS    REG_EXPAND_SZ    ",
            "-Xmx1g \"-Dmaven.repo.local=D:\\dev cache\\m2\"\r\n",
        );
        let (kind, value) = parse_query_output(out, "MAVEN_OPTS").unwrap();
        assert_eq!(kind, "REG_EXPAND_SZ");
        assert_eq!(value, r#"-Xmx1g "-Dmaven.repo.local=D:\dev cache\m2""#);
    }

    #[test]
    fn only_a_missing_value_reads_as_unset() {
        assert!(is_missing_value(
            "ERROR: The system was unable to find the specified registry key or value.\r\n"
        ));
        assert!(!is_missing_value("ERROR: Access is denied.\r\n"));
        assert!(!is_missing_value(""));
    }
}
