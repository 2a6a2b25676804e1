//! Detached container logs.
//!
//! A detached container's stdout and stderr both go to
//! `<state>/containers/<name>/container.log`.

use std::fs::File;
use std::path::Path;

use minibox_common::error::{MiniboxError, Result};

/// Creates (or truncates) the log file at `path`, creating its directory.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn create_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| MiniboxError::io(parent, e))?;
    }
    let file = File::create(path).map_err(|e| MiniboxError::io(path, e))?;
    tracing::debug!(path = %path.display(), "container log created");
    Ok(file)
}

/// Removes the directory holding the log at `path`, if it exists.
///
/// Failures are logged.
pub fn remove_log_dir(path: &Path) {
    let Some(dir) = path.parent() else {
        return;
    };
    match std::fs::remove_dir_all(dir) {
        Ok(()) => tracing::debug!("$ rm -rf {}", dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %dir.display(), error = %e, "log directory removal failed"),
    }
}

/// Reads the log at `path`.
///
/// Returns an empty string if the file does not exist, as for containers
/// started with a terminal.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_logs(path: &Path) -> Result<String> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(MiniboxError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn read_logs_missing_file_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let content = read_logs(&dir.path().join("container.log")).expect("should succeed");
        assert!(content.is_empty());
    }

    #[test]
    fn create_then_read_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("containers/web/container.log");
        let mut file = create_log_file(&path).expect("create");
        writeln!(file, "line one").expect("write");
        writeln!(file, "line two").expect("write");
        drop(file);

        let content = read_logs(&path).expect("read");
        assert_eq!(content, "line one\nline two\n");
    }

    #[test]
    fn create_truncates_previous_log() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("container.log");
        std::fs::write(&path, "stale").expect("seed");
        let _ = create_log_file(&path).expect("create");
        assert!(read_logs(&path).expect("read").is_empty());
    }

    #[test]
    fn non_utf8_output_is_replaced() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("container.log");
        std::fs::write(&path, [b'o', b'k', 0xff]).expect("seed");
        assert!(read_logs(&path).expect("read").starts_with("ok"));
    }

    #[test]
    fn remove_log_dir_drops_container_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("containers/web/container.log");
        let _ = create_log_file(&path).expect("create");

        remove_log_dir(&path);
        assert!(!dir.path().join("containers/web").exists());
        assert!(dir.path().join("containers").is_dir());
        remove_log_dir(&path);
    }
}
