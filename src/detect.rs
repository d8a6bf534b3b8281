//! Read-only detection of installed package managers.

use futures_util::future::join_all;
use serde::Serialize;

use crate::catalog::{CacheDescriptor, Catalog, pattern};
use crate::ui::prelude::*;

/// Why a descriptor was considered installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Evidence {
    Command(String),
    Path(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub manager: String,
    pub installed: bool,
    pub evidence: Option<Evidence>,
}

/// Either check alone is enough: a command resolvable on PATH, or a path
/// pattern matching at least one existing entry.
pub fn is_installed(descriptor: &CacheDescriptor) -> bool {
    find_evidence(descriptor).is_some()
}

pub fn find_evidence(descriptor: &CacheDescriptor) -> Option<Evidence> {
    if let Some(command) = descriptor
        .detection_commands
        .iter()
        .find(|command| which::which(command.as_str()).is_ok())
    {
        return Some(Evidence::Command(command.clone()));
    }

    descriptor
        .detection_paths
        .iter()
        .find(|pattern| !pattern::existing_matches(pattern).is_empty())
        .map(|pattern| Evidence::Path(pattern.clone()))
}

pub fn detect(descriptor: &CacheDescriptor) -> Detection {
    let evidence = find_evidence(descriptor);
    let detection = Detection {
        manager: descriptor.name.clone(),
        installed: evidence.is_some(),
        evidence,
    };

    emit(
        Level::Debug,
        "detect.result",
        &format!(
            "{} {}: {}",
            char::from(NerdFont::Search),
            detection.manager,
            if detection.installed {
                "installed"
            } else {
                "not found"
            }
        ),
        serde_json::to_value(&detection).ok(),
    );

    detection
}

/// Detect every descriptor concurrently; results keep catalog order.
pub async fn detect_all(catalog: &Catalog) -> Vec<Detection> {
    let handles = catalog.descriptors().iter().cloned().map(|descriptor| {
        tokio::task::spawn_blocking(move || detect(&descriptor))
    });

    join_all(handles)
        .await
        .into_iter()
        .zip(catalog.descriptors())
        .map(|(joined, descriptor)| {
            joined.unwrap_or_else(|_| Detection {
                manager: descriptor.name.clone(),
                installed: false,
                evidence: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DescriptorSpec;
    use serial_test::serial;
    use std::fs;

    fn descriptor(commands: &[&str], paths: &[String]) -> CacheDescriptor {
        let spec = DescriptorSpec {
            name: "probe".into(),
            detection_commands: commands.iter().map(|s| s.to_string()).collect(),
            detection_paths: paths.to_vec(),
            env_var: "PROBE_CACHE".into(),
            env_value_template: None,
            target: "probe".into(),
            source_paths: vec![],
            probe: None,
        };
        Catalog::new("/dev", vec![spec]).unwrap().descriptors()[0].clone()
    }

    #[cfg(unix)]
    fn fake_executable(dir: &std::path::Path, name: &str) {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn empty_descriptor_is_never_installed() {
        assert!(!is_installed(&descriptor(&[], &[])));
    }

    #[test]
    fn path_pattern_alone_is_sufficient() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("tool-1.2")).unwrap();
        let pattern = format!("{}/tool-*", dir.path().display());

        let d = descriptor(&["devcache-no-such-command"], &[pattern.clone()]);
        assert!(is_installed(&d));
        assert_eq!(find_evidence(&d), Some(Evidence::Path(pattern)));
    }

    #[test]
    fn missing_command_and_missing_path_is_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/absent-*", dir.path().display());
        assert!(!is_installed(&descriptor(
            &["devcache-no-such-command"],
            &[pattern]
        )));
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn command_on_path_is_sufficient() {
        let dir = tempfile::tempdir().unwrap();
        fake_executable(dir.path(), "devcache-fake-npm");

        let old_path = std::env::var_os("PATH").unwrap_or_default();
        let mut paths = vec![dir.path().to_path_buf()];
        paths.extend(std::env::split_paths(&old_path));
        let joined = std::env::join_paths(paths).unwrap();
        // SAFETY: serialized with every other PATH-mutating test
        unsafe { std::env::set_var("PATH", &joined) };

        let d = descriptor(&["devcache-fake-npm"], &[]);
        let found = find_evidence(&d);

        unsafe { std::env::set_var("PATH", &old_path) };
        assert_eq!(found, Some(Evidence::Command("devcache-fake-npm".into())));
    }

    #[test]
    fn adding_a_matching_path_never_flips_to_not_installed() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().display().to_string();
        let absent = format!("{}/absent", dir.path().display());

        let base = descriptor(&[], &[present.clone()]);
        let widened = descriptor(&["devcache-no-such-command"], &[absent, present]);
        assert!(is_installed(&base));
        assert!(is_installed(&widened));
    }

    #[tokio::test]
    async fn detect_all_keeps_catalog_order() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().display().to_string();
        let specs = ["a", "b", "c"].iter().enumerate().map(|(i, name)| DescriptorSpec {
            name: name.to_string(),
            detection_commands: vec![],
            detection_paths: if i == 1 { vec![present.clone()] } else { vec![] },
            env_var: format!("{}_CACHE", name.to_uppercase()),
            env_value_template: None,
            target: name.to_string(),
            source_paths: vec![],
            probe: None,
        });
        let catalog = Catalog::new("/dev", specs).unwrap();

        let detections = detect_all(&catalog).await;
        let names: Vec<_> = detections.iter().map(|d| d.manager.as_str()).collect();
        assert_eq!(names, ["a", "b", "c"]);
        assert_eq!(
            detections.iter().map(|d| d.installed).collect::<Vec<_>>(),
            [false, true, false]
        );
    }
}
