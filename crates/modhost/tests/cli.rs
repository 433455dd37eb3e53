use std::fs;

use assert_cmd::Command; // Bring Command into scope
use predicates::prelude::*; // Bring predicate traits into scope
use tempfile::tempdir;

fn modhost() -> Command {
    let mut cmd = Command::cargo_bin("modhost").expect("modhost binary should be built");
    // Keep discovery inside the test's own folders
    cmd.arg("--no-default-paths");
    cmd
}

#[test]
fn test_ping_command() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin("modhost")?;
    cmd.arg("--ping");
    cmd.assert().success().stdout(predicate::str::contains("pong"));
    Ok(())
}

#[test]
fn test_no_args_boots_core_modules() -> Result<(), Box<dyn std::error::Error>> {
    modhost()
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 2 modules (0 errors)"))
        .stdout(predicate::str::contains("MemoryReady raised by Memory"))
        .stdout(predicate::str::contains("pong").not());
    Ok(())
}

#[test]
fn test_list_puts_memory_first() -> Result<(), Box<dyn std::error::Error>> {
    let output = modhost().arg("list").output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let names: Vec<&str> = stdout.lines().filter_map(|l| l.split('\t').next()).collect();
    assert_eq!(names, vec!["Memory", "Logging"]);
    assert!(stdout.contains("core_memory"));
    Ok(())
}

#[test]
fn test_list_json() -> Result<(), Box<dyn std::error::Error>> {
    let output = modhost().args(["list", "--json"]).output()?;
    let views: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(views[0]["name"], "Memory");
    assert_eq!(views[0]["category"], "core");
    assert_eq!(views[1]["name"], "Logging");
    Ok(())
}

#[test]
fn test_invoke_with_fallback() -> Result<(), Box<dyn std::error::Error>> {
    modhost()
        .args(["invoke", "Missing", "--fallback", "memory", "set greeting hi"])
        .assert()
        .success()
        .stdout(predicate::str::diff("ok\n"));

    modhost()
        .args(["invoke", "Nobody", "anything"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(no answer)"));
    Ok(())
}

#[test]
fn test_event_reports_handled_count() -> Result<(), Box<dyn std::error::Error>> {
    // Only the logging module journals arbitrary signals
    modhost()
        .args(["event", "Ping"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ping: handled by 1 modules"));
    Ok(())
}

#[test]
fn test_discover_in_working_directory() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    fs::create_dir_all(dir.path().join("Databases"))?;
    fs::create_dir_all(dir.path().join("Modules/Echo"))?;

    modhost()
        .current_dir(dir.path())
        .arg("discover")
        .assert()
        .success()
        .stdout(predicate::str::contains("Databases (Data Storage)"))
        .stdout(predicate::str::contains("Echo"));
    Ok(())
}

#[test]
fn test_scan_explicit_folder() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let folder = dir.path().join("Chat");
    fs::create_dir_all(folder.join("lang"))?;
    fs::write(folder.join("chat.json"), "{}")?;

    modhost()
        .arg("scan")
        .arg(&folder)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 files\t1 subfolders"));
    Ok(())
}

#[test]
fn test_config_file_is_applied() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("modhost.json");
    fs::write(&path, r#"{"modules": [{"name": "Logging", "enabled": false}]}"#)?;

    modhost()
        .arg("--config")
        .arg(&path)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("(disabled)"));
    Ok(())
}

#[test]
fn test_config_command_prints_effective_config() -> Result<(), Box<dyn std::error::Error>> {
    modhost()
        .args(["config", "--debug"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"debug_logging\": true"))
        .stdout(predicate::str::contains("\"use_default_search_paths\": false"));
    Ok(())
}

#[test]
fn test_unreadable_config_fails() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ nope")?;

    modhost()
        .arg("--config")
        .arg(&path)
        .arg("list")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
    Ok(())
}
