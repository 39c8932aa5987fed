//! Single-instance lock and toggle signalling.
//!
//! The lock is a file holding the owner's pid.  A second invocation reads
//! that pid and, depending on its own mode, signals the running dock with
//! `SIGUSR1` before exiting.  Lock files left behind by a dead process are
//! reclaimed.

use log::{debug, info, warn};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("already running (pid {pid:?}, lock {})", .path.display())]
    AlreadyRunning { path: PathBuf, pid: Option<i32> },
    #[error("lock {0:?}: {1}")]
    Io(PathBuf, std::io::Error),
}

/// Held for the lifetime of the process; removes the lock file on drop.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    pub fn acquire(path: &Path) -> Result<Self, LockError> {
        if path.exists() && is_stale(path) {
            info!("removing stale lock {}", path.display());
            let _ = fs::remove_file(path);
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(LockError::AlreadyRunning {
                    path: path.to_path_buf(),
                    pid: read_pid(path),
                });
            }
            Err(e) => return Err(LockError::Io(path.to_path_buf(), e)),
        };
        writeln!(file, "{}", std::process::id())
            .map_err(|e| LockError::Io(path.to_path_buf(), e))?;
        debug!("acquired {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn read_pid(path: &Path) -> Option<i32> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}

fn process_alive(proc_root: &Path, pid: i32) -> bool {
    proc_root.join(pid.to_string()).exists()
}

/// A lock is stale when it names a pid missing from `/proc`.  Unreadable
/// or garbled lock files are left alone, and so is everything when `/proc`
/// is not mounted.
fn is_stale(path: &Path) -> bool {
    let proc_root = Path::new("/proc");
    if !proc_root.is_dir() {
        return false;
    }
    match read_pid(path) {
        Some(pid) if pid > 0 => !process_alive(proc_root, pid),
        _ => false,
    }
}

/// Ask the running instance to toggle its visibility.
pub fn signal_toggle(pid: i32) -> std::io::Result<()> {
    // SAFETY: kill(2) has no memory-safety preconditions.
    let rc = unsafe { libc::kill(pid, libc::SIGUSR1) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    info!("sent SIGUSR1 to running instance (pid {})", pid);
    Ok(())
}

/// What a second invocation should do about the running instance.
///
/// A resident or auto-hiding invocation leaves the running dock alone;
/// any other invocation toggles it.
pub fn on_already_running(pid: Option<i32>, quiet: bool) {
    match (pid, quiet) {
        (_, true) => info!("another instance is running, exiting"),
        (Some(pid), false) => {
            if let Err(e) = signal_toggle(pid) {
                warn!("could not signal pid {}: {}", pid, e);
            }
        }
        (None, false) => warn!("another instance is running but its pid is unknown"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_reports_owner() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swaydock.lock");
        let lock = InstanceLock::acquire(&path).unwrap();
        match InstanceLock::acquire(&path) {
            Err(LockError::AlreadyRunning { pid, .. }) => {
                assert_eq!(pid, Some(std::process::id() as i32))
            }
            other => panic!("expected AlreadyRunning, got {:?}", other),
        }
        drop(lock);
        assert!(!path.exists());
    }

    #[test]
    fn stale_lock_is_reclaimed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swaydock.lock");
        // pid_max is at most 2^22 on Linux.
        std::fs::write(&path, "99999999\n").unwrap();
        let lock = InstanceLock::acquire(&path).unwrap();
        assert_eq!(read_pid(lock.path()), Some(std::process::id() as i32));
    }

    #[test]
    fn garbled_lock_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("swaydock.lock");
        std::fs::write(&path, "not a pid").unwrap();
        assert!(matches!(
            InstanceLock::acquire(&path),
            Err(LockError::AlreadyRunning { pid: None, .. })
        ));
    }

    #[test]
    fn liveness_follows_proc_entries() {
        let proc_root = tempfile::tempdir().unwrap();
        std::fs::create_dir(proc_root.path().join("42")).unwrap();
        assert!(process_alive(proc_root.path(), 42));
        assert!(!process_alive(proc_root.path(), 43));
        assert!(process_alive(Path::new("/proc"), std::process::id() as i32));
    }
}
