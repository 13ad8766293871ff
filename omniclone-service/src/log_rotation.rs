//! Size-based rotation for the run log.
//!
//! `omniclone.log` is rotated to `omniclone.log.1` once it exceeds 5 MiB;
//! a single backup is kept.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;

pub const MAX_ROTATED_FILES: usize = 1;

/// Rotate `log_path` if it is at least `max_bytes` long.
///
/// `<name>.<max_files>` is dropped, every other backup shifts up by one and
/// the live file becomes `<name>.1`. Returns `true` if rotation happened;
/// a missing log is not an error.
pub fn rotate_if_needed(log_path: &Path, max_bytes: u64, max_files: usize) -> io::Result<bool> {
    let size = match fs::metadata(log_path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(err) => return Err(err),
    };

    if size < max_bytes || max_files == 0 {
        return Ok(false);
    }

    let oldest = numbered_path(log_path, max_files);
    if oldest.exists() {
        fs::remove_file(&oldest)?;
    }

    for n in (1..max_files).rev() {
        let src = numbered_path(log_path, n);
        if src.exists() {
            fs::rename(&src, numbered_path(log_path, n + 1))?;
        }
    }

    fs::rename(log_path, numbered_path(log_path, 1))?;
    Ok(true)
}

/// Rotate the run log under `config_dir` with the default limits.
pub fn rotate_run_log(config_dir: &Path) -> io::Result<bool> {
    rotate_if_needed(
        &crate::paths::log_path(config_dir),
        MAX_LOG_BYTES,
        MAX_ROTATED_FILES,
    )
}

fn numbered_path(base: &Path, n: usize) -> PathBuf {
    let name = base
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or(crate::paths::LOG_FILE);
    base.with_file_name(format!("{name}.{n}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const LIMIT: u64 = 1024;

    fn make_log(dir: &TempDir, size_bytes: usize) -> PathBuf {
        let path = dir.path().join("omniclone.log");
        fs::write(&path, vec![b'x'; size_bytes]).unwrap();
        path
    }

    #[test]
    fn rotation_noop_when_file_under_threshold() {
        let dir = TempDir::new().unwrap();
        let log = make_log(&dir, 100);
        assert!(!rotate_if_needed(&log, LIMIT, 1).unwrap());
        assert!(!numbered_path(&log, 1).exists());
    }

    #[test]
    fn oversized_log_moves_to_first_backup() {
        let dir = TempDir::new().unwrap();
        let log = make_log(&dir, LIMIT as usize + 1);
        assert!(rotate_if_needed(&log, LIMIT, 1).unwrap());

        assert!(!log.exists(), "live log is recreated by the next writer");
        let backup = numbered_path(&log, 1);
        assert_eq!(fs::metadata(&backup).unwrap().len(), LIMIT + 1);
    }

    #[test]
    fn single_backup_is_replaced() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("omniclone.log");
        fs::write(numbered_path(&log, 1), "previous").unwrap();
        make_log(&dir, LIMIT as usize);

        assert!(rotate_if_needed(&log, LIMIT, 1).unwrap());
        assert_ne!(fs::read_to_string(numbered_path(&log, 1)).unwrap(), "previous");
        assert!(!numbered_path(&log, 2).exists());
    }

    #[test]
    fn rotation_skips_missing_file_gracefully() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("nonexistent.log");
        assert!(!rotate_if_needed(&log, LIMIT, 1).unwrap());
    }

    #[test]
    fn deeper_history_shifts_backups() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("omniclone.log");

        for round in 1..=3u8 {
            fs::write(&log, vec![b'0' + round; LIMIT as usize]).unwrap();
            rotate_if_needed(&log, LIMIT, 2).unwrap();
        }

        assert_eq!(fs::read(numbered_path(&log, 1)).unwrap()[0], b'3');
        assert_eq!(fs::read(numbered_path(&log, 2)).unwrap()[0], b'2');
        assert!(!numbered_path(&log, 3).exists());
    }

    #[test]
    fn run_log_lives_in_config_dir() {
        let dir = TempDir::new().unwrap();
        let log = make_log(&dir, 10);
        assert!(!rotate_run_log(dir.path()).unwrap());
        assert!(log.exists());
    }
}
