//! CLI integration tests
//!
//! Tests the command-line interface end-to-end against a settings file.

use serde_json::{Value, json};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn saltkeep_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_saltkeep"))
}

/// Run saltkeep against `store` with the implicit passphrase for `extension_id`
fn run_saltkeep(store: &Path, extension_id: &str, args: &[&str]) -> Output {
    Command::new(saltkeep_bin())
        .arg("--store")
        .arg(store)
        .args(["--extension-id", extension_id])
        .args(args)
        .stdin(Stdio::null())
        .output()
        .expect("failed to run saltkeep")
}

/// Run saltkeep with an explicit passphrase from stdin
fn run_saltkeep_with_passphrase(
    store: &Path,
    args: &[&str],
    passphrase: &str,
) -> Result<Output, std::io::Error> {
    let mut child = Command::new(saltkeep_bin())
        .arg("--store")
        .arg(store)
        .arg("--passphrase-stdin")
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    {
        let stdin = child.stdin.as_mut().expect("failed to open stdin");
        // The command may exit before reading stdin.
        let _ = stdin.write_all(passphrase.as_bytes());
    }

    child.wait_with_output()
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn read_store(store: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(store).unwrap()).unwrap()
}

fn assert_success(output: &Output, what: &str) {
    assert!(
        output.status.success(),
        "{} failed: {}",
        what,
        String::from_utf8_lossy(&output.stderr)
    );
}

#[test]
fn test_set_get_secure_roundtrip() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    let result = run_saltkeep(
        &store,
        "ext-1",
        &["set-secure", "-n", "productKey", "--value", "sk-ABCDEFGHIJ1234567890"],
    );
    assert_success(&result, "set-secure");

    let result = run_saltkeep(&store, "ext-1", &["get-secure", "-n", "productKey"]);
    assert_success(&result, "get-secure");
    assert_eq!(stdout(&result), "sk-ABCDEFGHIJ1234567890\n");

    // Only the sealed record reaches disk.
    let raw = fs::read_to_string(&store).unwrap();
    assert!(!raw.contains("sk-ABCDEFGHIJ1234567890"));
    let record = &read_store(&store)["pe_secure_productKey"];
    assert_eq!(record["encrypted"], json!(true));
    assert!(record["data"].as_str().unwrap().len() >= 44);
    assert!(record["timestamp"].as_i64().unwrap() > 0);
}

#[test]
fn test_other_extension_id_cannot_read() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    let result = run_saltkeep(&store, "ext-1", &["set-secure", "-n", "productKey", "--value", "s3cret"]);
    assert_success(&result, "set-secure");

    let result = run_saltkeep(&store, "ext-2", &["get-secure", "-n", "productKey"]);
    assert_eq!(result.status.code(), Some(1));
    assert_eq!(stdout(&result), "");

    // The record is still intact for the right identity.
    let result = run_saltkeep(&store, "ext-1", &["get-secure", "-n", "productKey"]);
    assert_eq!(stdout(&result), "s3cret\n");
}

#[test]
fn test_explicit_passphrase_from_stdin() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    let result = run_saltkeep_with_passphrase(
        &store,
        &["set-secure", "-n", "token", "--value", "abc"],
        "correct horse",
    )
    .unwrap();
    assert_success(&result, "set-secure");

    let result =
        run_saltkeep_with_passphrase(&store, &["get-secure", "-n", "token"], "correct horse").unwrap();
    assert_eq!(stdout(&result), "abc\n");

    let result =
        run_saltkeep_with_passphrase(&store, &["get-secure", "-n", "token"], "wrong horse").unwrap();
    assert!(!result.status.success());
    assert_eq!(stdout(&result), "");
}

#[test]
fn test_set_secure_without_value_on_stdin_passphrase_fails() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    let result =
        run_saltkeep_with_passphrase(&store, &["set-secure", "-n", "token"], "pw").unwrap();
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Error:"));
    assert!(!store.exists());
}

#[test]
fn test_remove_secure() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    assert_success(
        &run_saltkeep(&store, "e", &["set-secure", "-n", "productKey", "--value", "k"]),
        "set-secure",
    );
    assert_success(&run_saltkeep(&store, "e", &["remove-secure", "-n", "productKey"]), "remove-secure");

    assert_eq!(read_store(&store), json!({}));
    let result = run_saltkeep(&store, "e", &["get-secure", "-n", "productKey"]);
    assert_eq!(result.status.code(), Some(1));
}

#[test]
fn test_regular_values_and_keys() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    assert_success(
        &run_saltkeep(&store, "e", &["set", "-n", "whitelistedDomains", "--value", "example.com"]),
        "set",
    );
    assert_success(
        &run_saltkeep(&store, "e", &["set", "-n", "limits", "--value", "{\"max\":3}", "--json"]),
        "set --json",
    );
    assert_success(
        &run_saltkeep(&store, "e", &["set-secure", "-n", "productKey", "--value", "k"]),
        "set-secure",
    );

    let result = run_saltkeep(&store, "e", &["get", "-n", "whitelistedDomains"]);
    assert_eq!(stdout(&result), "example.com\n");
    let result = run_saltkeep(&store, "e", &["get", "-n", "limits"]);
    assert_eq!(stdout(&result), "{\"max\":3}\n");

    let result = run_saltkeep(&store, "e", &["keys"]);
    assert_success(&result, "keys");
    assert_eq!(
        stdout(&result),
        "secure\tproductKey\nregular\tlimits\nregular\twhitelistedDomains\n"
    );

    assert_success(&run_saltkeep(&store, "e", &["remove", "-n", "limits"]), "remove");
    let result = run_saltkeep(&store, "e", &["get", "-n", "limits"]);
    assert_eq!(result.status.code(), Some(1));
}

#[test]
fn test_regular_write_into_secure_namespace_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    let result = run_saltkeep(&store, "e", &["set", "-n", "pe_secure_x", "--value", "plain"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).starts_with("Error:"));
}

#[test]
fn test_migrate() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");
    fs::write(&store, r#"{"apiToken": "plain-token", "count": 7}"#).unwrap();

    let result = run_saltkeep(&store, "e", &["migrate", "-n", "apiToken"]);
    assert_success(&result, "migrate");
    assert_eq!(stdout(&result), "migrated apiToken\n");

    let on_disk = read_store(&store);
    assert!(on_disk.get("apiToken").is_none());
    assert_eq!(on_disk["count"], json!(7));

    let result = run_saltkeep(&store, "e", &["get-secure", "-n", "apiToken"]);
    assert_eq!(stdout(&result), "plain-token\n");

    let result = run_saltkeep(&store, "e", &["migrate", "-n", "apiToken"]);
    assert_success(&result, "second migrate");
    assert_eq!(stdout(&result), "nothing to migrate for apiToken\n");
}

#[test]
fn test_validate_and_clear() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    assert_success(
        &run_saltkeep(&store, "e", &["set-secure", "-n", "good", "--value", "v"]),
        "set-secure",
    );
    let result = run_saltkeep(&store, "e", &["validate"]);
    assert_success(&result, "validate");
    assert!(stdout(&result).starts_with("valid: 1\ninvalid: 0\n"));

    let mut on_disk = read_store(&store);
    on_disk["pe_secure_broken"] = json!({"encrypted": true, "data": "not-an-envelope", "timestamp": 1});
    fs::write(&store, serde_json::to_string(&on_disk).unwrap()).unwrap();

    let result = run_saltkeep(&store, "e", &["validate"]);
    assert_eq!(result.status.code(), Some(1));
    let out = stdout(&result);
    assert!(out.contains("valid: 1\n"));
    assert!(out.contains("invalid: 1\n"));
    assert!(out.contains("Invalid data for key: broken"));

    let result = run_saltkeep(&store, "e", &["clear-secure"]);
    assert_success(&result, "clear-secure");
    assert_eq!(stdout(&result), "removed 2 secure value(s)\n");
    assert_eq!(read_store(&store), json!({}));
}

#[test]
fn test_settings_migrates_legacy_product_key() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");
    fs::write(
        &store,
        r#"{"productKey": "c2stQUJDREVGR0hJSjEyMzQ1Njc4OTA=", "whitelistedDomains": "a.com,b.com"}"#,
    )
    .unwrap();

    let result = run_saltkeep(&store, "e", &["settings"]);
    assert_success(&result, "settings");
    assert_eq!(stdout(&result), "productKey: configured\nwhitelistedDomains: a.com,b.com\n");

    let on_disk = read_store(&store);
    assert!(on_disk.get("productKey").is_none());
    assert!(on_disk.get("pe_secure_productKey").is_some());

    let result = run_saltkeep(&store, "e", &["get-secure", "-n", "productKey"]);
    assert_eq!(stdout(&result), "sk-ABCDEFGHIJ1234567890\n");
}

#[test]
fn test_corrupt_store_reports_error() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");
    fs::write(&store, "[1, 2, 3]").unwrap();

    let result = run_saltkeep(&store, "e", &["keys"]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Error:"));
    // Left untouched for the user to inspect.
    assert_eq!(fs::read_to_string(&store).unwrap(), "[1, 2, 3]");
}

#[test]
fn test_invalid_prefix_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let store = temp_dir.path().join("settings.json");

    let result = run_saltkeep(&store, "e", &["--prefix", "", "keys"]);
    assert!(!result.status.success());
}
