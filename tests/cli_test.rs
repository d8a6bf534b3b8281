mod utils;

use anyhow::Result;
use std::fs;

use utils::run_devcache_command;

#[test]
fn list_prints_builtin_managers_as_json_lines() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    let root = dir.path().join("packages");

    let output = run_devcache_command(&[
        "--config",
        config.to_str().unwrap(),
        "--target-root",
        root.to_str().unwrap(),
        "--output",
        "json",
        "list",
    ])?;
    assert_eq!(output.exit_code, 0, "list failed: {}", output.stderr);

    let events: Vec<serde_json::Value> = output
        .stdout
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()?;
    assert_eq!(events.len(), 10);
    assert!(events.iter().all(|e| e["code"] == "list.descriptor"));

    let npm = events
        .iter()
        .find(|e| e["data"]["name"] == "npm")
        .expect("npm descriptor");
    assert_eq!(npm["data"]["env_var"], "NPM_CONFIG_CACHE");
    assert_eq!(
        npm["data"]["target_path"],
        root.join("npm").display().to_string()
    );
    Ok(())
}

#[test]
fn config_init_then_show() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("nested/config.toml");
    let config_arg = config.to_str().unwrap();

    let output = run_devcache_command(&["--config", config_arg, "config", "path"])?;
    assert_eq!(output.stdout.trim(), config_arg);

    let output = run_devcache_command(&["--config", config_arg, "config", "init"])?;
    assert_eq!(output.exit_code, 0, "init failed: {}", output.stderr);
    assert!(config.exists());

    let output = run_devcache_command(&["--config", config_arg, "config", "init"])?;
    assert_ne!(output.exit_code, 0);

    let output = run_devcache_command(&["--config", config_arg, "config", "show"])?;
    assert!(output.stdout.contains("strict_copy = true"));
    assert!(output.stdout.contains("cleanup = \"ask\""));
    Ok(())
}

#[test]
fn excluded_and_custom_managers_follow_the_config_file() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!(
            r#"target_root = {:?}
exclude = ["npm", "yarn"]

[[custom]]
name = "deno"
env_var = "DENO_DIR"
target = "deno"
source_paths = ["~/.cache/deno"]
"#,
            dir.path().join("packages").display().to_string()
        ),
    )?;

    let output = run_devcache_command(&[
        "--config",
        config.to_str().unwrap(),
        "--output",
        "json",
        "list",
    ])?;
    assert_eq!(output.exit_code, 0, "list failed: {}", output.stderr);
    let names: Vec<String> = output
        .stdout
        .lines()
        .filter_map(|l| serde_json::from_str::<serde_json::Value>(l).ok())
        .filter_map(|e| e["data"]["name"].as_str().map(str::to_string))
        .collect();
    assert!(names.contains(&"deno".to_string()));
    assert!(!names.contains(&"npm".to_string()));
    assert!(!names.contains(&"yarn".to_string()));
    Ok(())
}

#[test]
fn invalid_config_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let config = dir.path().join("config.toml");
    fs::write(&config, "target_root = \"relative\"\n")?;

    let output = run_devcache_command(&["--config", config.to_str().unwrap(), "list"])?;
    assert_eq!(output.exit_code, 2);
    assert!(output.stderr.contains("absolute"));
    Ok(())
}
