//! Common test helpers shared across integration tests

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(dead_code)] // Not all helpers are used by every test file

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Path to the compiled `wake` binary
pub fn get_binary_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_wake"))
}

/// Helper to create a temporary directory for tests
pub fn create_temp_dir() -> tempfile::TempDir {
    tempfile::TempDir::new().unwrap()
}

/// Helper to create a wakefile in a directory
pub fn create_wakefile(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("wakefile");
    fs::write(&path, content).unwrap();
    path
}

/// Run `wake` in `dir` with discovery unaffected by the caller's environment
pub fn run_wake(dir: &Path, args: &[&str]) -> Output {
    Command::new(get_binary_path())
        .args(args)
        .current_dir(dir)
        .env_remove("WAKEFILE")
        .env_remove("WAKE_LOG")
        .output()
        .expect("Failed to execute wake")
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}
