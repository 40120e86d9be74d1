use std::{path::PathBuf, sync::Arc};

use thiserror::Error;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// This enum covers all possible error conditions that can occur while reading metadata images,
/// maintaining the metadata cache and binding the references of a compilation. Each variant
/// provides specific context about the failure mode to enable appropriate error handling.
///
/// # Error Categories
///
/// ## File Parsing Errors
/// - [`Error::InvalidOffset`] - Invalid file offset during parsing
/// - [`Error::Malformed`] - Corrupted or invalid metadata structure
/// - [`Error::OutOfBounds`] - Attempted to read beyond file boundaries
/// - [`Error::NotSupported`] - Unsupported file format or feature
/// - [`Error::Empty`] - Empty input provided
///
/// ## I/O and External Errors
/// - [`Error::FileError`] - Filesystem I/O errors, including files that do not exist
/// - [`Error::GoblinErr`] - PE parsing errors from goblin crate
/// - [`Error::MetadataRead`] - Loading a specific metadata file failed
///
/// ## Reference Binding Errors
/// - [`Error::NotAReference`] - Query with a reference the compilation does not declare
/// - [`Error::ImageKindMismatch`] - Assembly query against a module reference or vice versa
/// - [`Error::LockError`] - Thread synchronization failure
///
/// # Examples
///
/// ```rust,no_run
/// use dotbind::{Error, metadata::AssemblyMetadata};
/// use std::path::Path;
///
/// match AssemblyMetadata::from_file(Path::new("assembly.dll")) {
///     Ok(metadata) => {
///         println!("Loaded {}", metadata.identity().display_name());
///     }
///     Err(Error::NotSupported) => {
///         eprintln!("File format is not supported");
///     }
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed file: {} ({}:{})", message, file, line);
///     }
///     Err(Error::FileError(io_err)) => {
///         eprintln!("I/O error: {}", io_err);
///     }
///     Err(e) => {
///         eprintln!("Other error: {}", e);
///     }
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    // File parsing Errors
    /// Encountered an invalid offset while parsing file structures.
    ///
    /// This error occurs when the parser encounters an offset that is invalid
    /// for the current file context, such as stream offsets that point outside
    /// of the metadata root.
    #[error("Could not retrieve a valid offset!")]
    InvalidOffset,

    /// The file is damaged and could not be parsed.
    ///
    /// This error indicates that the file structure is corrupted or doesn't
    /// conform to the expected ECMA-335 layout. The error includes the source
    /// location where the malformation was detected for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while parsing the file.
    ///
    /// This error occurs when trying to read data beyond the end of the file
    /// or stream. It's a safety check to prevent buffer overruns during parsing.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// This file type is not supported.
    ///
    /// Indicates that the input is neither a PE image with a CLR header nor a
    /// standalone metadata image.
    #[error("This file type is not supported")]
    NotSupported,

    /// Provided input was empty.
    ///
    /// This error occurs when an empty file or buffer is provided where
    /// actual metadata was expected.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    ///
    /// Wraps standard I/O errors that can occur during file operations
    /// such as reading from disk, permission issues, or files that do not exist.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),

    /// Error from the goblin crate during PE parsing.
    #[error("{0}")]
    GoblinErr(#[from] goblin::error::Error),

    /// Loading the metadata of a specific file failed.
    ///
    /// Produced by the metadata cache and the reference manager when a file that was
    /// explicitly requested could not be read or parsed. Failures are never cached, a
    /// later request for the same path tries again.
    ///
    /// # Fields
    ///
    /// * `path` - The path that was requested
    /// * `source` - The underlying I/O or format error
    #[error("Failed to read metadata from '{}' - {source}", path.display())]
    MetadataRead {
        /// The requested path
        path: PathBuf,
        /// The underlying cause
        #[source]
        source: Arc<Error>,
    },

    /// The queried reference is not one of the compilation's declared references.
    #[error("Not a reference of this compilation - {0}")]
    NotAReference(String),

    /// An assembly symbol was requested for a module reference, or a module symbol
    /// for an assembly reference.
    #[error("The reference does not describe the requested kind of image - {0}")]
    ImageKindMismatch(String),

    /// Failed to lock target.
    ///
    /// This error occurs when thread synchronization fails, typically
    /// when a lock is found in an invalid state.
    #[error("Failed to lock target")]
    LockError,
}

impl Error {
    /// Wraps `source` into an [`Error::MetadataRead`] for `path`.
    pub(crate) fn metadata_read(path: impl Into<PathBuf>, source: Error) -> Error {
        match source {
            // Already attributed to a file, don't nest twice
            Error::MetadataRead { .. } => source,
            source => Error::MetadataRead {
                path: path.into(),
                source: Arc::new(source),
            },
        }
    }

    /// Returns `true` if this error, or the error it wraps, is a not-found I/O error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::FileError(error) => error.kind() == std::io::ErrorKind::NotFound,
            Error::MetadataRead { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_carries_location() {
        let error = malformed_error!("bad table - {}", 7);
        match error {
            Error::Malformed {
                message,
                file,
                line,
            } => {
                assert_eq!(message, "bad table - 7");
                assert!(file.ends_with("error.rs"));
                assert!(line > 0);
            }
            _ => panic!("Expected Malformed"),
        }
    }

    #[test]
    fn metadata_read_wraps_once() {
        let inner = Error::FileError(std::io::Error::from(std::io::ErrorKind::NotFound));
        let wrapped = Error::metadata_read("a.dll", inner);
        let rewrapped = Error::metadata_read("b.dll", wrapped);

        match &rewrapped {
            Error::MetadataRead { path, .. } => assert_eq!(path, &PathBuf::from("a.dll")),
            _ => panic!("Expected MetadataRead"),
        }
        assert!(rewrapped.is_not_found());
        assert!(rewrapped.to_string().contains("a.dll"));
    }
}
