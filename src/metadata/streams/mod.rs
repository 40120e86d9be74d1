//! Metadata streams located through the metadata root.
//!
//! - [`TablesHeader`] - the `#~` stream holding the metadata tables
//! - [`Strings`] - the `#Strings` heap of identifiers
//! - [`Blob`] - the `#Blob` heap (public keys, hashes)
//! - [`Guid`] - the `#GUID` heap (module version ids)
//!
//! Stream headers are described by [`StreamHeader`]. The `#US` heap is located but not read,
//! nothing involved in reference binding lives there.

mod blob;
mod guid;
mod streamheader;
mod strings;
mod tablesheader;

pub use blob::Blob;
pub use guid::Guid;
pub use streamheader::{StreamHeader, VALID_STREAM_NAMES};
pub use strings::Strings;
pub use tablesheader::TablesHeader;
