#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn aquapi(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("aquapi").unwrap();
    cmd.current_dir(dir.path())
        .env("AQUAPI_CONFIG", dir.path().join("aquapi.yaml"))
        .env_remove("AQUAPI_ACTUATOR_ID")
        .env_remove("AQUAPI_SERVER_URL")
        .env_remove("RUST_LOG");
    cmd
}

// ---------------------------------------------------------------------------
// aquapi decide
// ---------------------------------------------------------------------------

#[test]
fn decide_high_reading_activates() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args([
            "decide",
            "--condition",
            "high",
            "--condition-value",
            "5",
            "--value",
            "10",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("true"))
        .stdout(predicate::str::contains("OK"));
}

#[test]
fn decide_json_without_reading_is_no_measurement() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args(["decide", "--json", "--condition", "always"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"activate\": false"))
        .stdout(predicate::str::contains("NoMeasurement"));
}

#[test]
fn decide_old_reading_is_disconnected() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args([
            "decide",
            "--condition",
            "always",
            "--value",
            "1",
            "--measured-secs-ago",
            "90000",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disconnected"));
}

#[test]
fn decide_recent_activation_is_cooldown() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args([
            "decide",
            "--condition",
            "always",
            "--value",
            "1",
            "--period",
            "60",
            "--last-activated-secs-ago",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("CooldownActive"));
}

#[test]
fn decide_negative_period_never_blocks() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args([
            "decide",
            "-j",
            "--condition",
            "low",
            "--condition-value",
            "6.5",
            "--value",
            "5.9",
            "--period",
            "-5",
            "--last-activated-secs-ago",
            "0",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"activate\": true"))
        .stdout(predicate::str::contains("\"period\": -5.0"));
}

#[test]
fn decide_disabled_wins() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args(["decide", "--condition", "always", "--value", "1", "--disabled"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disabled"));
}

#[test]
fn decide_rejects_unknown_condition() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args(["decide", "--condition", "sideways"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown activation condition"));
}

// ---------------------------------------------------------------------------
// aquapi config
// ---------------------------------------------------------------------------

#[test]
fn config_init_then_check_warns_about_actuator() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir).args(["config", "init"]).assert().success();
    assert!(dir.path().join("aquapi.yaml").exists());

    aquapi(&dir)
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[warning]"))
        .stdout(predicate::str::contains("actuator_id"));
}

#[test]
fn config_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir).args(["config", "init"]).assert().success();
    aquapi(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    aquapi(&dir)
        .args(["config", "init", "--force"])
        .assert()
        .success();
}

#[test]
fn config_check_missing_file_fails() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config not found"));
}

#[test]
fn config_check_reports_errors() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("aquapi.yaml"),
        "controller:\n  actuator_id: 1\n  server_url: aquapi.local\n",
    )
    .unwrap();
    aquapi(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error]"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn config_show_json_uses_file_values() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("aquapi.yaml"),
        "server:\n  port: 8081\n",
    )
    .unwrap();
    let output = aquapi(&dir)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_yaml::Value = serde_yaml::from_slice(&output.stdout).unwrap();
    assert_eq!(value["server"]["port"].as_u64(), Some(8081));
    assert_eq!(value["controller"]["gpio_pin"].as_u64(), Some(26));
}

// ---------------------------------------------------------------------------
// aquapi control
// ---------------------------------------------------------------------------

#[test]
fn control_requires_an_actuator() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args(["control", "--dry-run", "--once"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no actuator selected"));
}

#[test]
fn control_once_survives_unreachable_server() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args([
            "control",
            "--dry-run",
            "--once",
            "--actuator",
            "1",
            "--server-url",
            "http://127.0.0.1:1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("poll_failures=1"))
        .stdout(predicate::str::contains("activations=0"));
}

#[test]
fn control_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("aquapi.yaml"),
        "controller:\n  request_timeout_ms: 0\n",
    )
    .unwrap();
    aquapi(&dir)
        .args(["control", "--dry-run", "--once", "--actuator", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config validation found errors"))
        .stderr(predicate::str::contains("request_timeout_ms"));
}

#[test]
fn control_validates_overridden_server_url() {
    let dir = TempDir::new().unwrap();
    aquapi(&dir)
        .args([
            "control",
            "--dry-run",
            "--once",
            "--actuator",
            "1",
            "--server-url",
            "aquapi.local",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must start with http://"));
}

#[cfg(unix)]
#[test]
fn control_once_interrupted_during_hold_ends_off() {
    use std::io::{BufRead, BufReader};
    use std::process::Stdio;
    use std::sync::mpsc;
    use std::time::Duration;

    let mut server = mockito::Server::new();
    let _state = server
        .mock("GET", "/actuators/1/state")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"activate":true,"status":"OK","duration":30.0,"period":1.0}"#)
        .create();

    let dir = TempDir::new().unwrap();
    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("aquapi"))
        .args(["control", "--dry-run", "--once", "--actuator", "1", "--server-url"])
        .arg(server.url())
        .current_dir(dir.path())
        .env("AQUAPI_CONFIG", dir.path().join("aquapi.yaml"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    let stderr = child.stderr.take().unwrap();
    let (tx, rx) = mpsc::channel();
    std::thread::spawn(move || {
        for line in BufReader::new(stderr).lines() {
            if tx.send(line.unwrap()).is_err() {
                break;
            }
        }
    });

    let mut outputs = Vec::new();
    loop {
        let line = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("controller never switched the output on");
        if line.contains("simulated output") {
            outputs.push(line.clone());
            if line.contains("level=on") {
                break;
            }
        }
    }

    let status = std::process::Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());

    while let Ok(line) = rx.recv_timeout(Duration::from_secs(10)) {
        if line.contains("simulated output") {
            outputs.push(line);
        }
    }
    let exit = child.wait().unwrap();
    assert!(exit.success(), "exit status {exit:?}");
    let last = outputs.last().unwrap();
    assert!(last.contains("level=off"), "outputs: {outputs:#?}");
}
