//! PID file bookkeeping for the running server process.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub fn write_pid_file(pid_path: Option<&str>) -> crate::error::Result<Option<PathBuf>> {
    let Some(path_str) = pid_path else {
        return Ok(None);
    };
    let path = Path::new(path_str);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let pid = std::process::id();
    let mut file = fs::File::create(path)?;
    writeln!(file, "{pid}")?;

    info!(?path, pid, "wrote pid file");
    Ok(Some(path.to_path_buf()))
}

pub fn remove_pid_file(pid_path: Option<&PathBuf>) {
    let Some(path) = pid_path else { return };
    match fs::remove_file(path) {
        Ok(()) => info!(?path, "removed pid file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(?path, error = %e, "failed to remove pid file"),
    }
}

/// Removes the pid file on drop, so an early return or panic during startup
/// doesn't leave a stale file behind.
pub struct PidFileGuard {
    path: Option<PathBuf>,
}

impl PidFileGuard {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }
}

impl Drop for PidFileGuard {
    fn drop(&mut self) {
        remove_pid_file(self.path.as_ref());
    }
}
