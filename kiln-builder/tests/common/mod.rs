//! Shared fixtures for builder integration tests

#![allow(dead_code)]

use kiln_builder::{BuildConfig, CommandStep, ToolchainConfig};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

/// A kiln home with a small Go source tree
pub struct Home {
    pub dir: TempDir,
    pub source: PathBuf,
}

impl Home {
    pub fn new() -> Self {
        init_tracing();

        let dir = TempDir::new().unwrap();
        let source = dir.path().join("sources").join("demo");
        std::fs::create_dir_all(&source).unwrap();
        std::fs::write(
            source.join("main.go"),
            "package main\n\nfunc main() {}\n",
        )
        .unwrap();

        Self { dir, source }
    }

    /// Config whose golang toolchain is a single `sh -c` stub
    pub fn config(&self, script: &str, timeout: Duration) -> BuildConfig {
        BuildConfig::new(self.dir.path())
            .with_timeout(timeout)
            .with_golang(ToolchainConfig::new(vec![CommandStep::new(
                "sh",
                ["-c", script],
            )]))
    }

    /// Entries currently under `<home>/tmp`, recursively
    pub fn tmp_entries(&self) -> Vec<PathBuf> {
        fn walk(dir: &std::path::Path, out: &mut Vec<PathBuf>) {
            if let Ok(entries) = std::fs::read_dir(dir) {
                for entry in entries.flatten() {
                    let path = entry.path();
                    if path.is_dir() {
                        walk(&path, out);
                    }
                    out.push(path);
                }
            }
        }

        let mut out = Vec::new();
        walk(&self.dir.path().join("tmp"), &mut out);
        out
    }
}

/// Whether `pid` names a live, non-zombie process
#[cfg(target_os = "linux")]
pub fn process_running(pid: &str) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid.trim())) {
        Ok(stat) => stat
            .rsplit_once(") ")
            .map(|(_, rest)| !rest.starts_with('Z') && !rest.starts_with('X'))
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Polls until `pid` exits or `within` passes
#[cfg(target_os = "linux")]
pub async fn wait_for_exit(pid: &str, within: Duration) -> bool {
    let deadline = std::time::Instant::now() + within;
    while process_running(pid) {
        if std::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    true
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
