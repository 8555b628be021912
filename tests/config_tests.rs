//! Configuration system tests
//!
//! Tests configuration loading, validation, and environment overrides
//! through the binary

mod common;

use predicates::prelude::*;

use common::{tork_cmd, Fixture};

fn validate(fixture: &Fixture) -> assert_cmd::assert::Assert {
    tork_cmd()
        .args(["config", "validate", "--config", fixture.config()])
        .assert()
}

// ─────────────────────────────────────────────────────────────────
// Valid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_empty_config_uses_defaults() {
    let fixture = Fixture::new();
    fixture.write_config("");

    validate(&fixture).success();

    tork_cmd()
        .args(["config", "show", "--config", fixture.config()])
        .assert()
        .success()
        .stdout(predicate::str::contains("mailbox_capacity = 1024"))
        .stdout(predicate::str::contains("interval_secs = 5"))
        .stdout(predicate::str::contains("kind = \"docker\""));
}

#[test]
fn test_full_config() {
    let fixture = Fixture::new();
    fixture.write_config(
        r#"
[worker]
name = "worker-east-1"
tags = ["gpu", "fast"]

[broker]
mailbox_capacity = 64

[runtime]
kind = "mock"
docker_binary = "/usr/local/bin/docker"
stop_timeout_secs = 30

[stats]
interval_secs = 10

[logging]
level = "debug"
file = "/tmp/tork/worker.log"
max_file_size_mb = 50
max_files = 3
json_format = true
"#,
    );

    validate(&fixture).success();
}

// ─────────────────────────────────────────────────────────────────
// Invalid Configuration Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_zero_mailbox_capacity() {
    let fixture = Fixture::new();
    fixture.write_config("[broker]\nmailbox_capacity = 0\n");

    validate(&fixture)
        .failure()
        .code(10)
        .stderr(predicate::str::contains("mailbox_capacity"));
}

#[test]
fn test_oversized_mailbox_capacity() {
    let fixture = Fixture::new();
    fixture.write_config("[broker]\nmailbox_capacity = 9223372036854775807\n");

    validate(&fixture)
        .failure()
        .code(10)
        .stderr(predicate::str::contains("mailbox_capacity must be at most"));
}

#[test]
fn test_zero_stats_interval() {
    let fixture = Fixture::new();
    fixture.write_config("[stats]\ninterval_secs = 0\n");

    validate(&fixture).failure().code(10);
}

#[test]
fn test_unknown_runtime_kind() {
    let fixture = Fixture::new();
    fixture.write_config("[runtime]\nkind = \"podman\"\n");

    validate(&fixture)
        .failure()
        .stderr(predicate::str::contains("E101"));
}

#[test]
fn test_invalid_log_level() {
    let fixture = Fixture::new();
    fixture.write_config("[logging]\nlevel = \"invalid_level\"\n");

    validate(&fixture).failure();
}

#[test]
fn test_empty_worker_name() {
    let fixture = Fixture::new();
    fixture.write_config("[worker]\nname = \"\"\n");

    validate(&fixture).failure();
}

#[test]
fn test_malformed_toml() {
    let fixture = Fixture::new();
    fixture.write_config("[broker\nmailbox_capacity = 1\n");

    validate(&fixture)
        .failure()
        .stderr(predicate::str::contains("E101"));
}

// ─────────────────────────────────────────────────────────────────
// Environment Override Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_env_overrides_file() {
    let fixture = Fixture::new();
    fixture.write_config("[broker]\nmailbox_capacity = 8\n");

    tork_cmd()
        .env("TORK_MAILBOX_CAPACITY", "256")
        .env("TORK_RUNTIME", "mock")
        .env("TORK_WORKER_NAME", "from-env")
        .args(["config", "show", "--config", fixture.config()])
        .assert()
        .success()
        .stdout(predicate::str::contains("mailbox_capacity = 256"))
        .stdout(predicate::str::contains("kind = \"mock\""))
        .stdout(predicate::str::contains("name = \"from-env\""));
}

#[test]
fn test_env_invalid_value_fails_validation() {
    let fixture = Fixture::new();
    fixture.write_config("");

    tork_cmd()
        .env("TORK_STATS_INTERVAL_SECS", "0")
        .args(["config", "validate", "--config", fixture.config()])
        .assert()
        .failure();
}

#[test]
fn test_config_file_from_env() {
    let fixture = Fixture::with_mock_runtime();

    tork_cmd()
        .env("TORK_CONFIG", fixture.config())
        .args(["run", "--submit", "/nonexistent/batch.jsonl"])
        .assert()
        .failure()
        .code(20);
}
