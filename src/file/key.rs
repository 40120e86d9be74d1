//! Cache keys for files on disk.
//!
//! A [`FileKey`] identifies one *version* of a file: its canonical full path together with the
//! last-write time observed when the key was created. Rewriting a file changes its timestamp and
//! therefore produces a different key, so stale cache entries are never handed out for a file
//! that changed on disk.
//!
//! Paths are compared case-insensitively where the platform file system is (Windows), or when
//! requested through [`FileKey::create_with`].

use std::{
    ffi::OsString,
    fmt,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    time::SystemTime,
};

use crate::Result;

/// Identity of a file version: canonical path plus last-write timestamp
#[derive(Debug, Clone)]
pub struct FileKey {
    full_path: PathBuf,
    compare_path: OsString,
    last_write_time: SystemTime,
}

impl FileKey {
    /// Create the key for the file at `path`, using the platform's path case sensitivity.
    ///
    /// The path is canonicalized (made absolute, `.`/`..` and symlinks resolved) and the file's
    /// current last-write time is read.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file does not exist (kind `NotFound`) or its
    /// metadata can't be read.
    pub fn create(path: impl AsRef<Path>) -> Result<FileKey> {
        Self::create_with(path, cfg!(windows))
    }

    /// Create the key for the file at `path` with explicit path case sensitivity.
    ///
    /// # Errors
    /// See [`FileKey::create`].
    pub fn create_with(path: impl AsRef<Path>, case_insensitive: bool) -> Result<FileKey> {
        let full_path = std::fs::canonicalize(path.as_ref())?;
        let last_write_time = std::fs::metadata(&full_path)?.modified()?;

        Ok(Self::new(full_path, last_write_time, case_insensitive))
    }

    /// Build a key from already known parts, without touching the file system
    pub fn new(full_path: PathBuf, last_write_time: SystemTime, case_insensitive: bool) -> FileKey {
        // Paths that are not valid Unicode are compared byte for byte
        let compare_path = match full_path.to_str() {
            Some(path) if case_insensitive => OsString::from(path.to_lowercase()),
            _ => full_path.as_os_str().to_owned(),
        };

        FileKey {
            full_path,
            compare_path,
            last_write_time,
        }
    }

    /// The canonical path of the file
    #[must_use]
    pub fn full_path(&self) -> &Path {
        &self.full_path
    }

    /// The last-write time observed when this key was created
    #[must_use]
    pub fn last_write_time(&self) -> SystemTime {
        self.last_write_time
    }
}

impl PartialEq for FileKey {
    fn eq(&self, other: &Self) -> bool {
        self.compare_path == other.compare_path && self.last_write_time == other.last_write_time
    }
}

impl Eq for FileKey {}

impl Hash for FileKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.compare_path.hash(state);
        self.last_write_time.hash(state);
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path.display())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashSet, fs, time::Duration};

    use super::*;

    #[test]
    fn same_file_same_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.dll");
        fs::write(&path, b"BSJB").unwrap();

        let direct = FileKey::create(&path).unwrap();
        let dotted = FileKey::create(dir.path().join(".").join("a.dll")).unwrap();

        assert_eq!(direct, dotted);
        assert!(direct.full_path().is_absolute());

        let mut set = HashSet::new();
        set.insert(direct);
        assert!(set.contains(&dotted));
    }

    #[test]
    fn timestamp_change_new_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.dll");
        fs::write(&path, b"BSJB").unwrap();

        let before = FileKey::create(&path).unwrap();

        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(before.last_write_time() + Duration::from_secs(10))
            .unwrap();
        drop(file);

        let after = FileKey::create(&path).unwrap();

        assert_eq!(before.full_path(), after.full_path());
        assert_ne!(before, after);
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = FileKey::create(dir.path().join("missing.dll")).unwrap_err();
        assert!(error.is_not_found());
    }

    #[test]
    fn case_sensitivity() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);

        let upper = FileKey::new(PathBuf::from("/refs/System.DLL"), time, true);
        let lower = FileKey::new(PathBuf::from("/refs/system.dll"), time, true);
        assert_eq!(upper, lower);

        let upper = FileKey::new(PathBuf::from("/refs/System.DLL"), time, false);
        let lower = FileKey::new(PathBuf::from("/refs/system.dll"), time, false);
        assert_ne!(upper, lower);

        let later = FileKey::new(
            PathBuf::from("/refs/system.dll"),
            time + Duration::from_millis(1),
            false,
        );
        assert_ne!(lower, later);
    }

    #[cfg(unix)]
    #[test]
    fn non_unicode_paths_stay_distinct() {
        use std::{ffi::OsStr, os::unix::ffi::OsStrExt};

        let time = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000);
        let ff = PathBuf::from(OsStr::from_bytes(b"/refs/\xff.dll"));
        let fe = PathBuf::from(OsStr::from_bytes(b"/refs/\xfe.dll"));

        for case_insensitive in [false, true] {
            let a = FileKey::new(ff.clone(), time, case_insensitive);
            let b = FileKey::new(fe.clone(), time, case_insensitive);
            assert_ne!(a, b);
            assert_eq!(a, FileKey::new(ff.clone(), time, case_insensitive));

            let set: HashSet<_> = [a, b].into_iter().collect();
            assert_eq!(set.len(), 2);
        }
    }
}
