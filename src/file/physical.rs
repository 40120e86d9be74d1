//! Memory-mapped file backend.
//!
//! Files referenced by a compilation are mapped read-only with `memmap2` instead of being read
//! into a buffer. Parsed metadata copies out everything it keeps, so the mapping only lives as
//! long as the parse of a single image.

use super::Backend;
use crate::{
    Error::{Error, FileError, OutOfBounds},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// Metadata image backed by a read-only memory map of a file on disk
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Map the file at `path`
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can't be opened (including when it does
    /// not exist), or [`crate::Error::Error`] if mapping fails
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        // Zero-length files can't be mapped on every platform
        if file.metadata()?.len() == 0 {
            return Err(crate::Error::Empty);
        }

        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(Error(error.to_string())),
        };

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(OutOfBounds);
        };

        if offset_end > self.data.len() {
            return Err(OutOfBounds);
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn physical() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"BSJB\x01\x00\x01\x00").unwrap();
        file.flush().unwrap();

        let physical = Physical::new(file.path()).unwrap();

        assert_eq!(physical.len(), 8);
        assert_eq!(physical.data_slice(0, 4).unwrap(), b"BSJB");
        assert!(physical.data_slice(6, 4).is_err());
    }

    #[test]
    fn missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();

        match Physical::new(dir.path().join("missing.dll")) {
            Err(FileError(error)) => assert_eq!(error.kind(), std::io::ErrorKind::NotFound),
            _ => panic!("Expected a not-found FileError"),
        }

        let empty = dir.path().join("empty.dll");
        fs::write(&empty, []).unwrap();
        assert!(matches!(Physical::new(&empty), Err(crate::Error::Empty)));
    }
}
