//! Advisory lock serializing runs against one deployment target.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{ActivationError, ActivationResult};
use crate::target::DeploymentTarget;

/// Holds an exclusive lock file for a deployment target, keyed by
/// service and region. Acquisition never blocks: a held lock
/// fails fast naming the holder. The file is removed on drop.
#[derive(Debug)]
pub struct ActivationLock {
    path: PathBuf,
}

impl ActivationLock {
    /// Acquire the lock for `target` in the system temp
    /// directory, where separate processes on the same host find
    /// each other.
    pub fn acquire(target: &DeploymentTarget) -> ActivationResult<Self> {
        Self::acquire_in(&std::env::temp_dir(), target)
    }

    /// Acquire the lock in a specific directory.
    ///
    /// A crashed run leaves its file behind; the `LockHeld` error
    /// reports the recorded pid and the file's age so an operator
    /// can decide to remove it.
    pub fn acquire_in(dir: &Path, target: &DeploymentTarget) -> ActivationResult<Self> {
        let path = dir.join(format!("estafeta-{}.lock", target.lock_key()));

        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                writeln!(file, "pid {}", std::process::id())?;
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(ActivationError::LockHeld {
                    key: target.lock_key(),
                    holder: describe_holder(&path),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the underlying lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ActivationLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn describe_holder(path: &Path) -> String {
    use std::fmt::Write as _;

    let mut holder = fs::read_to_string(path)
        .map_or_else(|_| "unknown holder".to_string(), |s| s.trim().to_string());
    let age = fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.elapsed().ok());
    if let Some(elapsed) = age {
        let _ = write!(holder, ", held for {}s", elapsed.as_secs());
    }
    holder
}
