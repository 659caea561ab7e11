//! PID file utilities for daemon running detection.
//!
//! `start` records its PID here; `status` and `stop` read it back. A file that
//! cannot be parsed or names a dead process is stale and removed on sight.

use std::fs;
use std::io;
use std::path::Path;

/// Returns the PID of the running daemon, if any.
///
/// Automatically cleans up stale PID files.
pub fn running_pid(path: &Path) -> Option<u32> {
    let pid_str = fs::read_to_string(path).ok()?;

    let pid: u32 = match pid_str.trim().parse() {
        Ok(p) => p,
        Err(_) => {
            tracing::debug!(path = %path.display(), "Removing unparsable PID file");
            cleanup_stale_pid_file(path);
            return None;
        }
    };

    if is_process_running(pid) {
        Some(pid)
    } else {
        tracing::debug!(path = %path.display(), pid, "Removing stale PID file");
        cleanup_stale_pid_file(path);
        None
    }
}

/// Writes the current process ID, creating parent directories.
pub fn write_pid_file(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{}\n", std::process::id()))
}

/// Removes the PID file if it still names this process.
pub fn remove_pid_file(path: &Path) {
    let ours = fs::read_to_string(path)
        .ok()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .is_some_and(|pid| pid == std::process::id());
    if ours {
        cleanup_stale_pid_file(path);
    }
}

/// Check if a process with the given PID is running.
///
/// On Linux, this checks if `/proc/{pid}/stat` exists.
/// On other Unix systems, this probes with signal 0.
pub fn is_process_running(pid: u32) -> bool {
    #[cfg(target_os = "linux")]
    {
        Path::new(&format!("/proc/{}/stat", pid)).exists()
    }

    #[cfg(all(unix, not(target_os = "linux")))]
    {
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        match i32::try_from(pid) {
            Ok(raw) => kill(Pid::from_raw(raw), None).is_ok(),
            Err(_) => false,
        }
    }
}

fn cleanup_stale_pid_file(path: &Path) {
    let _ = fs::remove_file(path);
}
