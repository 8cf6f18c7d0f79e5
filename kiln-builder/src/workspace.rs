//! Build workspace management
//!
//! Handles the per-attempt working directory:
//! - Creating it and staging the pipeline source into it
//! - Removing it when the attempt ends, whatever the outcome

use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{BuildError, Result};

/// Removes a build working directory when the attempt ends
///
/// Armed before the environment is prepared so the directory is removed on
/// every exit path, including a failure halfway through preparation. Callers
/// should `release` it; dropping it unreleased removes the directory on the
/// current thread.
#[derive(Debug)]
pub struct WorkspaceGuard {
    path: PathBuf,
    armed: bool,
}

impl WorkspaceGuard {
    pub fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Removes the directory without blocking the runtime and disarms the guard
    pub async fn release(mut self) -> io::Result<()> {
        self.armed = false;
        let result = tokio::fs::remove_dir_all(&self.path).await;
        Self::settle(&self.path, result)
    }

    /// Removes the directory now
    pub fn cleanup(&self) -> io::Result<()> {
        Self::settle(&self.path, std::fs::remove_dir_all(&self.path))
    }

    fn settle(path: &Path, result: io::Result<()>) -> io::Result<()> {
        match result {
            Ok(()) => {
                debug!("Removed workspace {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl Drop for WorkspaceGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = self.cleanup() {
            warn!(
                "Failed to cleanup workspace {} on drop: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Creates `workspace` and copies the contents of `source` into it
///
/// # Errors
/// `BuildError::Environment` if the source is not a directory, or the
/// workspace cannot be created or populated
pub async fn stage_source(source: &Path, workspace: &Path) -> Result<()> {
    if !tokio::fs::metadata(source)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
    {
        return Err(BuildError::Environment {
            message: format!("source directory {} does not exist", source.display()),
            source: None,
        });
    }

    tokio::fs::create_dir_all(workspace).await.map_err(|e| {
        BuildError::environment(
            format!("failed to create workspace {}", workspace.display()),
            e,
        )
    })?;

    let from = source.to_path_buf();
    let to = workspace.to_path_buf();
    let copied = tokio::task::spawn_blocking(move || copy_dir(&from, &to))
        .await
        .map_err(|e| BuildError::environment("source staging task failed", io::Error::other(e)))?
        .map_err(|e| {
            BuildError::environment(
                format!(
                    "failed to stage {} into {}",
                    source.display(),
                    workspace.display()
                ),
                e,
            )
        })?;

    info!(
        "Staged {} file(s) from {} into {}",
        copied,
        source.display(),
        workspace.display()
    );
    Ok(())
}

/// Recursively copies a directory tree, returning the number of files copied
fn copy_dir(from: &Path, to: &Path) -> io::Result<usize> {
    std::fs::create_dir_all(to)?;
    let mut copied = 0;

    for entry in std::fs::read_dir(from)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = to.join(entry.file_name());

        if file_type.is_dir() {
            copied += copy_dir(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        } else if file_type.is_symlink() && entry.path().is_file() {
            // Copies the link target's contents
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        } else {
            warn!(
                "Skipping {} while staging: not a regular file or a link to one",
                entry.path().display()
            );
        }
    }

    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_stage_source_copies_tree() {
        let src = TempDir::new().unwrap();
        std::fs::write(src.path().join("main.go"), "package main").unwrap();
        std::fs::create_dir(src.path().join("pkg")).unwrap();
        std::fs::write(src.path().join("pkg/util.go"), "package pkg").unwrap();

        let root = TempDir::new().unwrap();
        let ws = root.path().join("golang").join("demo-1");

        stage_source(src.path(), &ws).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(ws.join("main.go")).unwrap(),
            "package main"
        );
        assert!(ws.join("pkg/util.go").is_file());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stage_source_follows_file_symlinks() {
        let src = TempDir::new().unwrap();
        let shared = TempDir::new().unwrap();
        std::fs::write(shared.path().join("go.mod"), "module demo").unwrap();
        std::os::unix::fs::symlink(shared.path().join("go.mod"), src.path().join("go.mod"))
            .unwrap();
        std::os::unix::fs::symlink(src.path().join("missing"), src.path().join("dangling"))
            .unwrap();

        let root = TempDir::new().unwrap();
        let ws = root.path().join("ws");
        stage_source(src.path(), &ws).await.unwrap();

        let staged = ws.join("go.mod");
        assert!(!staged.symlink_metadata().unwrap().file_type().is_symlink());
        assert_eq!(std::fs::read_to_string(staged).unwrap(), "module demo");
        assert!(!ws.join("dangling").exists());
    }

    #[tokio::test]
    async fn test_stage_source_missing_source() {
        let root = TempDir::new().unwrap();
        let err = stage_source(&root.path().join("nope"), &root.path().join("ws"))
            .await
            .unwrap_err();

        assert!(matches!(err, BuildError::Environment { .. }));
        assert!(!root.path().join("ws").exists());
    }

    #[test]
    fn test_guard_removes_directory_on_drop() {
        let root = TempDir::new().unwrap();
        let ws = root.path().join("ws");
        std::fs::create_dir_all(ws.join("nested")).unwrap();
        std::fs::write(ws.join("nested/file"), "x").unwrap();

        {
            let guard = WorkspaceGuard::new(ws.clone());
            assert_eq!(guard.path(), ws.as_path());
        }

        assert!(!ws.exists());
    }

    #[tokio::test]
    async fn test_release_removes_directory() {
        let root = TempDir::new().unwrap();
        let ws = root.path().join("ws");
        std::fs::create_dir_all(ws.join("pkg")).unwrap();
        std::fs::write(ws.join("pkg/lib.go"), "package pkg").unwrap();

        WorkspaceGuard::new(ws.clone()).release().await.unwrap();
        assert!(!ws.exists());

        // Already gone
        WorkspaceGuard::new(ws.clone()).release().await.unwrap();
    }

    #[test]
    fn test_guard_tolerates_missing_directory() {
        let root = TempDir::new().unwrap();
        let guard = WorkspaceGuard::new(root.path().join("never-created"));
        assert!(guard.cleanup().is_ok());
    }
}
