//! Cross-process run lock.
//!
//! A run holds its scope by creating a directory:
//!
//! ```text
//! <lock root>/omniclone_lock_<user>_<service>-<sha256(config dir)[..12]>/
//!   owner.json      (pid, start time, config dir; diagnostics only)
//! ```
//!
//! `create_dir` fails when the directory already exists, so of two racing
//! acquirers exactly one wins and the other gets
//! [`LockError::AlreadyLocked`] without waiting.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::LockError;

pub const LOCK_DIR_ENV: &str = "OMNICLONE_LOCK_DIR";
const OWNER_FILE: &str = "owner.json";

/// Identity under which runs exclude each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockScope {
    key: String,
}

impl LockScope {
    /// Key a scope by service name and configuration directory. Two
    /// configurations in different directories never share a key.
    pub fn new(service_name: &str, config_dir: &Path) -> Self {
        let canonical = config_dir
            .canonicalize()
            .unwrap_or_else(|_| config_dir.to_path_buf());
        let digest = {
            let mut h = Sha256::new();
            h.update(canonical.to_string_lossy().as_bytes());
            hex::encode(h.finalize())
        };
        Self {
            key: format!("{service_name}-{}", &digest[..12]),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

/// Contents of `owner.json` inside a held lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwner {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
    pub config_dir: PathBuf,
}

/// Creates and inspects lock directories under one root.
#[derive(Debug, Clone)]
pub struct LockManager {
    root: PathBuf,
    user: String,
}

impl LockManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            user: current_user(),
        }
    }

    /// Locks under the system temporary directory.
    pub fn system() -> Self {
        Self::new(std::env::temp_dir())
    }

    pub fn lock_path(&self, scope: &LockScope) -> PathBuf {
        self.root
            .join(format!("omniclone_lock_{}_{}", self.user, scope.key()))
    }

    /// Take the lock for `scope`, failing immediately if it is held.
    pub fn acquire(&self, scope: &LockScope, config_dir: &Path) -> Result<LockHandle, LockError> {
        let path = self.lock_path(scope);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| LockError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        match fs::create_dir(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let owner = read_owner(&path);
                return Err(LockError::AlreadyLocked { path, owner });
            }
            Err(e) => return Err(LockError::Io { path, source: e }),
        }

        let owner = LockOwner {
            pid: std::process::id(),
            started_at: Utc::now(),
            config_dir: config_dir.to_path_buf(),
        };
        if let Err(err) = write_owner(&path, &owner) {
            tracing::warn!("could not record lock owner in {}: {err}", path.display());
        }
        tracing::debug!("acquired lock {}", path.display());

        Ok(LockHandle {
            path,
            released: false,
        })
    }

    /// The owner of the lock for `scope`, if it is currently held.
    /// Returns `Some(None)` when held but the owner record is unreadable.
    pub fn inspect(&self, scope: &LockScope) -> Option<Option<LockOwner>> {
        let path = self.lock_path(scope);
        path.is_dir().then(|| read_owner(&path))
    }
}

/// Exclusive ownership of one scope. Released exactly once, either by
/// [`LockHandle::release`] or on drop.
#[derive(Debug)]
pub struct LockHandle {
    path: PathBuf,
    released: bool,
}

impl LockHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Remove the lock directory. Returns `false` if it was already released.
    /// Removal failures are logged and the handle still counts as released.
    pub fn release(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        match fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!("released lock {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::warn!("lock {} vanished before release", self.path.display());
            }
            Err(e) => tracing::warn!("could not release lock {}: {e}", self.path.display()),
        }
        true
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release();
    }
}

fn write_owner(dir: &Path, owner: &LockOwner) -> std::io::Result<()> {
    let json = serde_json::to_vec_pretty(owner)?;
    fs::write(dir.join(OWNER_FILE), json)
}

fn read_owner(dir: &Path) -> Option<LockOwner> {
    let bytes = fs::read(dir.join(OWNER_FILE)).ok()?;
    serde_json::from_slice(&bytes).ok()
}

fn current_user() -> String {
    let raw = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_owned());
    raw.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
