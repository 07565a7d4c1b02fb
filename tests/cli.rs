use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::NamedTempFile;

fn gate() -> Command {
    let mut cmd = Command::cargo_bin("notification-gate").unwrap();
    for var in [
        "NOTIFICATION_GATE_LOG_LEVEL",
        "NOTIFICATION_GATE_LOG_FORMAT",
        "NOTIFICATION_GATE_LISTEN_ADDR",
        "NOTIFICATION_GATE_STORE_TIMEOUT_MS",
        "NOTIFICATION_GATE_STORE_BACKEND",
        "NOTIFICATION_GATE_REDIS_URL",
        "NOTIFICATION_GATE_QUOTA_FILE",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

#[test]
fn test_cli_version() {
    gate()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("notification-gate 0.1.0"));
}

#[test]
fn test_cli_help() {
    gate()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Per-user, per-category admission control for outbound notifications",
        ));
}

#[test]
fn test_cli_send_missing_user() {
    gate()
        .args(["send", "--category", "news-notification", "--message", "hello there"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "required arguments were not provided",
        ));
}

#[test]
fn test_cli_check_config_defaults() {
    let temp_file = NamedTempFile::new().unwrap();
    let missing = temp_file.path().with_extension("missing");

    gate()
        .arg("check-config")
        .arg("--config")
        .arg(&missing)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration OK"))
        .stdout(predicate::str::contains("news-notification limit=1 window=86400s"))
        .stdout(predicate::str::contains("status-notification limit=2 window=60s"))
        .stdout(predicate::str::contains("marketing-notification limit=3 window=3600s"));
}

#[test]
fn test_cli_check_config_custom_quotas() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(
        temp_file.path(),
        r#"
[store]
backend = "memory"

[quotas.digest-notification]
limit = 4
window_secs = 600
"#,
    )
    .unwrap();

    gate()
        .arg("check-config")
        .arg("--config")
        .arg(temp_file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Memory"))
        .stdout(predicate::str::contains("digest-notification limit=4 window=600s"))
        .stdout(predicate::str::contains("news-notification").not());
}

#[test]
fn test_cli_check_config_rejects_zero_window() {
    let temp_file = NamedTempFile::new().unwrap();
    fs::write(
        temp_file.path(),
        r#"
[quotas.status-notification]
limit = 2
window_secs = 0
"#,
    )
    .unwrap();

    gate()
        .arg("check-config")
        .arg("--config")
        .arg(temp_file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("status-notification"));
}
