//! Filter-file discovery.
//!
//! For a target `t` in mode `m` the candidates are, most specific first:
//!
//! ```text
//! filters.<m>.<t>.txt   (target-specific)
//! filters.<m>.txt       (mode-global)
//! ```
//!
//! Each candidate name is looked up in every search directory in priority
//! order before moving on to the next, less specific name. The sync tool
//! evaluates filter rules first-match-wins, so this order is observable.

use std::fs::File;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use omniclone_core::{Mode, TargetName};

use crate::error::SyncError;

/// Flag passed to the sync tool once per filter file.
pub const FILTER_FLAG: &str = "--filter-from";

pub fn target_filter_name(mode: Mode, target: &TargetName) -> String {
    format!("filters.{mode}.{target}.txt")
}

pub fn mode_filter_name(mode: Mode) -> String {
    format!("filters.{mode}.txt")
}

/// Resolves the ordered filter set for a target.
#[derive(Debug, Clone)]
pub struct FilterResolver {
    search_dirs: Vec<PathBuf>,
    skip_empty: bool,
}

impl FilterResolver {
    /// Duplicate directories are dropped, first occurrence wins.
    pub fn new<I>(search_dirs: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut dirs: Vec<PathBuf> = Vec::new();
        for dir in search_dirs {
            let key = dir.canonicalize().unwrap_or_else(|_| dir.clone());
            let seen = dirs
                .iter()
                .any(|d| d.canonicalize().unwrap_or_else(|_| d.clone()) == key);
            if !seen {
                dirs.push(dir);
            }
        }
        Self {
            search_dirs: dirs,
            skip_empty: false,
        }
    }

    /// Drop zero-length filter files instead of passing them through.
    pub fn skip_empty(mut self, skip: bool) -> Self {
        self.skip_empty = skip;
        self
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.search_dirs
    }

    /// Existing filter files for `target`, most specific first.
    ///
    /// A missing candidate is skipped. A candidate that exists but cannot be
    /// opened for reading (or is not a regular file) is an error.
    pub fn resolve(&self, mode: Mode, target: &TargetName) -> Result<Vec<PathBuf>, SyncError> {
        let names = [target_filter_name(mode, target), mode_filter_name(mode)];
        let mut found = Vec::new();
        for name in &names {
            for dir in &self.search_dirs {
                let candidate = dir.join(name);
                if let Some(path) = self.check_candidate(candidate)? {
                    found.push(path);
                }
            }
        }
        Ok(found)
    }

    fn check_candidate(&self, path: PathBuf) -> Result<Option<PathBuf>, SyncError> {
        let meta = match std::fs::metadata(&path) {
            Ok(meta) => meta,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(unreadable(path, e)),
        };
        if !meta.is_file() {
            let source = std::io::Error::new(ErrorKind::Other, "not a regular file");
            return Err(unreadable(path, source));
        }
        if let Err(e) = File::open(&path) {
            return Err(unreadable(path, e));
        }
        if self.skip_empty && meta.len() == 0 {
            tracing::debug!("skipping empty filter file {}", path.display());
            return Ok(None);
        }
        Ok(Some(path))
    }
}

fn unreadable(path: PathBuf, source: std::io::Error) -> SyncError {
    SyncError::UnreadableFilter { path, source }
}

/// `--filter-from <path>` for each path, in order.
pub fn filter_arguments(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .flat_map(|p| [FILTER_FLAG.to_owned(), display_path(p)])
        .collect()
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn name() -> TargetName {
        TargetName::from("photos")
    }

    #[test]
    fn nothing_found_is_empty_not_error() {
        let dir = TempDir::new().unwrap();
        let resolver = FilterResolver::new([dir.path().to_path_buf()]);
        assert!(resolver.resolve(Mode::Bisync, &name()).unwrap().is_empty());
    }

    #[test]
    fn target_specific_comes_before_mode_global() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("filters.bisync.txt"), "- *.tmp\n").unwrap();
        fs::write(dir.path().join("filters.bisync.photos.txt"), "- *.raw\n").unwrap();

        let resolver = FilterResolver::new([dir.path().to_path_buf()]);
        let found = resolver.resolve(Mode::Bisync, &name()).unwrap();
        assert_eq!(
            found,
            vec![
                dir.path().join("filters.bisync.photos.txt"),
                dir.path().join("filters.bisync.txt"),
            ]
        );
    }

    #[test]
    fn other_mode_files_are_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("filters.backup.txt"), "").unwrap();
        fs::write(dir.path().join("filters.backup.photos.txt"), "").unwrap();

        let resolver = FilterResolver::new([dir.path().to_path_buf()]);
        assert!(resolver.resolve(Mode::Bisync, &name()).unwrap().is_empty());
    }

    #[test]
    fn specificity_outranks_directory_priority() {
        let config = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();
        fs::write(config.path().join("filters.backup.txt"), "- a\n").unwrap();
        fs::write(install.path().join("filters.backup.photos.txt"), "- b\n").unwrap();
        fs::write(install.path().join("filters.backup.txt"), "- c\n").unwrap();

        let resolver = FilterResolver::new([
            config.path().to_path_buf(),
            install.path().to_path_buf(),
        ]);
        let found = resolver.resolve(Mode::Backup, &name()).unwrap();
        assert_eq!(
            found,
            vec![
                install.path().join("filters.backup.photos.txt"),
                config.path().join("filters.backup.txt"),
                install.path().join("filters.backup.txt"),
            ]
        );
    }

    #[test]
    fn duplicate_search_dirs_collapse() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("filters.backup.txt"), "- a\n").unwrap();
        let resolver =
            FilterResolver::new([dir.path().to_path_buf(), dir.path().to_path_buf()]);
        assert_eq!(resolver.search_dirs().len(), 1);
        assert_eq!(resolver.resolve(Mode::Backup, &name()).unwrap().len(), 1);
    }

    #[test]
    fn directory_in_place_of_filter_is_an_error() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("filters.bisync.txt")).unwrap();
        let resolver = FilterResolver::new([dir.path().to_path_buf()]);
        let err = resolver.resolve(Mode::Bisync, &name()).unwrap_err();
        assert!(matches!(err, SyncError::UnreadableFilter { .. }), "got: {err}");
    }

    #[test]
    fn empty_files_pass_through_unless_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("filters.bisync.txt"), "").unwrap();

        let keep = FilterResolver::new([dir.path().to_path_buf()]);
        assert_eq!(keep.resolve(Mode::Bisync, &name()).unwrap().len(), 1);

        let skip = keep.clone().skip_empty(true);
        assert!(skip.resolve(Mode::Bisync, &name()).unwrap().is_empty());
    }

    #[test]
    fn filter_arguments_repeat_the_flag() {
        let args = filter_arguments(&[PathBuf::from("/a.txt"), PathBuf::from("/b.txt")]);
        assert_eq!(args, vec!["--filter-from", "/a.txt", "--filter-from", "/b.txt"]);
    }
}
