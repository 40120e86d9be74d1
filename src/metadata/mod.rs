//! ECMA-335 metadata reading and writing.
//!
//! This module reads the parts of .NET metadata that reference binding depends on, and can write
//! standalone images containing them.
//!
//! # Architecture
//!
//! - [`root`] - the metadata root and its stream headers
//! - [`streams`] - the `#~` tables header and the `#Strings`, `#Blob` and `#GUID` heaps
//! - [`tables`] - table identifiers, row sizing for the full table schema and the decoded rows
//! - [`identity`] - assembly identities, versions and strong names
//! - [`builder`] - [`MetadataImageBuilder`] for writing standalone images
//!
//! On top of these, [`ModuleMetadata`] holds the decoded view of one module, and
//! [`AssemblyMetadata`] groups the modules of one assembly. Both are immutable once loaded and
//! are what the [`crate::cache::MetadataCache`] shares between compilations.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotbind::metadata::AssemblyMetadata;
//! use std::path::Path;
//!
//! let assembly = AssemblyMetadata::from_file(Path::new("System.Core.dll"))?;
//! println!("{}", assembly.identity());
//! for reference in assembly.assembly_references() {
//!     println!("  -> {}", reference);
//! }
//! # Ok::<(), dotbind::Error>(())
//! ```

pub mod builder;
pub mod identity;
pub mod root;
pub mod streams;
pub mod tables;

mod assembly;
mod module;

use std::fmt;

pub use assembly::AssemblyMetadata;
pub use builder::MetadataImageBuilder;
pub use module::{FileEntry, ModuleMetadata};

/// Whether a metadata reference names an assembly or a netmodule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MetadataImageKind {
    /// An assembly, loaded with all of its modules
    #[default]
    Assembly,
    /// A single netmodule, added to the referencing assembly
    Module,
}

impl fmt::Display for MetadataImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataImageKind::Assembly => write!(f, "assembly"),
            MetadataImageKind::Module => write!(f, "module"),
        }
    }
}
