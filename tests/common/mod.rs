//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure

#![allow(dead_code)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;

/// Get a command for the tork binary
pub fn tork_cmd() -> Command {
    Command::cargo_bin("tork").unwrap()
}

/// Path of the built binary, for tests that manage the process themselves
pub fn tork_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_tork"))
}

/// Temporary directory holding a config file and any other inputs
pub struct Fixture {
    pub dir: TempDir,
    pub config_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let config_path = dir.path().join("tork.toml");
        Self { dir, config_path }
    }

    /// Fixture whose config selects the mock runtime
    pub fn with_mock_runtime() -> Self {
        let fixture = Self::new();
        fixture.write_config(
            r#"
[worker]
name = "it-worker"

[runtime]
kind = "mock"

[stats]
interval_secs = 1

[logging]
level = "info"
"#,
        );
        fixture
    }

    pub fn write_config(&self, content: &str) {
        fs::write(&self.config_path, content).expect("Failed to write config");
    }

    /// Write an extra file into the fixture directory
    pub fn write_file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    pub fn config(&self) -> &str {
        self.config_path.to_str().unwrap()
    }
}
