use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn adsyncd(config: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("adsyncd"));
    cmd.arg("-c").arg(config).env_remove("RUST_LOG");
    cmd
}

struct Fixture {
    dir: TempDir,
    config: PathBuf,
}

impl Fixture {
    fn new(user_options: &str, extra_daemon: &str) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        fs::write(
            root.join("passwd"),
            "root:x:0:0:root:/root:/bin/bash\n\
             alice:x:1001:1000:Alice Liddell:/home/alice:/bin/bash\n\
             bob:!:1002:100:Bob Builder:/home/bob:/bin/bash\n\
             carol:x:1003:100:Carol:/home/carol:/bin/bash\n",
        )
        .expect("write passwd");
        fs::write(
            root.join("shadow"),
            "root:*:19000:0:99999:7:::\n\
             alice:$2b$12$aliceshashaliceshashalic:19000:0:99999:7:::\n\
             bob:!:19000:0:99999:7:::\n",
        )
        .expect("write shadow");
        fs::write(
            root.join("group"),
            "root:x:0:\nusers:x:100:\nadsync:x:1000:bob\n",
        )
        .expect("write group");

        let config = root.join("config.yaml");
        let yaml = format!(
            r#"directory:
  client_id: client
  client_secret: secret
  group_id: group-1
  auth_url: http://127.0.0.1:9/token
local:
  files:
    passwd: {passwd}
    shadow: {shadow}
    group: {group}
  sync_group: adsync
  default_password: change-me
  user_options: {user_options}
daemon:
  pid_file: {pid}
{extra_daemon}"#,
            passwd = root.join("passwd").display(),
            shadow = root.join("shadow").display(),
            group = root.join("group").display(),
            pid = root.join("adsyncd.pid").display(),
        );
        fs::write(&config, yaml).expect("write config");
        Self { dir, config }
    }

    fn valid() -> Self {
        Self::new(r#"{ "-m": "", "-g": adsync }"#, "")
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

#[test]
fn version_names_the_binary() {
    Command::new(assert_cmd::cargo::cargo_bin!("adsyncd"))
        .arg("--version")
        .assert()
        .success()
        .stdout(contains("adsyncd"));
}

#[test]
fn check_config_accepts_valid_file() {
    let fixture = Fixture::valid();
    adsyncd(&fixture.config)
        .arg("check-config")
        .assert()
        .success()
        .stdout(contains("config ok"))
        .stdout(contains("sync group:      adsync"));
}

#[test]
fn check_config_rejects_missing_group_assignment() {
    let fixture = Fixture::new(r#"{ "-m": "" }"#, "");
    adsyncd(&fixture.config)
        .arg("check-config")
        .assert()
        .failure()
        .stderr(contains("failed to load config"))
        .stderr(contains("-g adsync"));
}

#[test]
fn check_config_reports_missing_file() {
    let dir = TempDir::new().expect("tempdir");
    adsyncd(&dir.path().join("absent.yaml"))
        .arg("check-config")
        .assert()
        .failure()
        .stderr(contains("absent.yaml"));
}

#[test]
fn forwarding_without_daemon_reports_not_running() {
    let fixture = Fixture::valid();
    for command in ["sync", "reload", "stop"] {
        adsyncd(&fixture.config)
            .arg(command)
            .assert()
            .success()
            .stdout(contains("adsyncd is not running"));
    }
}

#[test]
fn forwarding_with_stale_lock_reports_not_running() {
    let fixture = Fixture::valid();
    fs::write(fixture.path("adsyncd.pid"), "not-a-pid").expect("write pid");

    adsyncd(&fixture.config)
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("adsyncd is not running"));
}

#[test]
fn status_json_reports_stopped_daemon() {
    let fixture = Fixture::valid();
    let output = adsyncd(&fixture.config)
        .args(["status", "--json"])
        .output()
        .expect("run status");
    assert!(output.status.success());

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(status["running"], false);
    assert_eq!(status["pid"], serde_json::Value::Null);
    assert_eq!(status["stale_lock"], false);
    assert_eq!(
        status["pid_file"],
        fixture.path("adsyncd.pid").display().to_string()
    );
}

#[test]
fn status_warns_about_stale_lock() {
    let fixture = Fixture::valid();
    fs::write(fixture.path("adsyncd.pid"), "garbage").expect("write pid");

    adsyncd(&fixture.config)
        .arg("status")
        .assert()
        .success()
        .stdout(contains("not running"))
        .stdout(contains("stale lock file"));
}

#[test]
fn accounts_json_lists_sync_group_members() {
    let fixture = Fixture::valid();
    let output = adsyncd(&fixture.config)
        .args(["accounts", "--json"])
        .output()
        .expect("run accounts");
    assert!(output.status.success());

    let payload: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["sync_group"], "adsync");
    let names: Vec<&str> = payload["accounts"]
        .as_array()
        .expect("accounts array")
        .iter()
        .map(|a| a["username"].as_str().expect("username"))
        .collect();
    assert_eq!(names, ["bob", "alice"]);
    assert_eq!(payload["accounts"][0]["has_password"], false);
    assert_eq!(payload["accounts"][1]["has_password"], true);
    assert_eq!(payload["accounts"][0]["password_set"], false);
    assert_eq!(payload["accounts"][1]["password_set"], true);
}

#[test]
fn accounts_table_mentions_group() {
    let fixture = Fixture::valid();
    adsyncd(&fixture.config)
        .arg("accounts")
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .assert()
        .success()
        .stdout(contains("2 accounts in group adsync"))
        .stdout(contains("Alice Liddell"));
}

#[test]
fn logs_tail_the_configured_file() {
    let scratch = TempDir::new().expect("tempdir");
    let log = scratch.path().join("adsyncd.log");
    fs::write(&log, "first-line\nsecond-line\nthird-line\n").expect("write log");
    let fixture = Fixture::new(
        r#"{ "-g": adsync }"#,
        &format!("  log_file: {}\n", log.display()),
    );

    adsyncd(&fixture.config)
        .args(["logs", "--lines", "2"])
        .assert()
        .success()
        .stdout(contains("second-line\nthird-line"))
        .stdout(contains("first-line").not());
}

#[test]
fn logs_without_log_file_points_at_stderr() {
    let fixture = Fixture::valid();
    adsyncd(&fixture.config)
        .arg("logs")
        .assert()
        .success()
        .stdout(contains("daemon logs to stderr"));
}
