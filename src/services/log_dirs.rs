//! XDG-compliant log directory management
//!
//! Logs are stored in `$XDG_STATE_HOME/cloud-explorer/logs/` (typically
//! `~/.local/state/cloud-explorer/logs/`), one PID-named file per process.
//! Old log files from earlier runs are removed on startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

const APP_DIR: &str = "cloud-explorer";

/// Minimum age for log files to be cleaned up (7 days)
const CLEANUP_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Cached log directory path
static LOG_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Get the base log directory, creating it if necessary.
///
/// Falls back to the system temp directory if the XDG location cannot be
/// determined or created.
pub fn log_dir() -> &'static PathBuf {
    LOG_DIR.get_or_init(|| {
        let fallback = || std::env::temp_dir().join(format!("{}-logs", APP_DIR));
        let dir = get_xdg_log_dir().unwrap_or_else(fallback);

        if let Err(e) = fs::create_dir_all(&dir) {
            tracing::warn!("Failed to create log directory {:?}: {}", dir, e);
            return fallback();
        }

        dir
    })
}

fn get_xdg_log_dir() -> Option<PathBuf> {
    if let Ok(state_home) = std::env::var("XDG_STATE_HOME") {
        let path = PathBuf::from(state_home);
        if path.is_absolute() {
            return Some(path.join(APP_DIR).join("logs"));
        }
    }

    home_dir().map(|home| home.join(".local").join("state").join(APP_DIR).join("logs"))
}

fn home_dir() -> Option<PathBuf> {
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home));
    }

    #[cfg(windows)]
    if let Ok(profile) = std::env::var("USERPROFILE") {
        return Some(PathBuf::from(profile));
    }

    None
}

/// Get the log file path for this process.
///
/// Returns `{log_dir}/cloud-explorer-{PID}.log`
pub fn main_log_path() -> PathBuf {
    log_dir().join(log_file_name(std::process::id()))
}

fn log_file_name(pid: u32) -> String {
    format!("{}-{}.log", APP_DIR, pid)
}

/// Remove log files left by earlier runs that are older than a week
pub fn cleanup_stale_logs() {
    cleanup_stale_logs_in_dir(log_dir(), std::process::id(), CLEANUP_AGE);
}

fn cleanup_stale_logs_in_dir(dir: &Path, current_pid: u32, age: Duration) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let name = file_name.to_string_lossy();

        let Some(pid) = extract_pid_from_filename(&name) else {
            continue;
        };
        if pid == current_pid {
            continue;
        }

        if entry.file_type().map(|t| t.is_file()).unwrap_or(false)
            && is_file_older_than(&entry.path(), age)
        {
            match fs::remove_file(entry.path()) {
                Ok(()) => tracing::debug!("Cleaned up stale log file: {:?}", entry.path()),
                Err(e) => tracing::debug!("Failed to clean up stale log {:?}: {}", entry.path(), e),
            }
        }
    }
}

fn is_file_older_than(path: &Path, age: Duration) -> bool {
    let Ok(modified) = fs::metadata(path).and_then(|m| m.modified()) else {
        return false;
    };

    SystemTime::now()
        .duration_since(modified)
        .map(|elapsed| elapsed > age)
        .unwrap_or(false)
}

/// Extract the PID from a name like "cloud-explorer-12345.log"
fn extract_pid_from_filename(name: &str) -> Option<u32> {
    let without_ext = name.strip_suffix(".log")?;
    let pid_str = without_ext.strip_prefix(APP_DIR)?.strip_prefix('-')?;
    pid_str.parse().ok()
}
