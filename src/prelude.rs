//! # dotbind Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the dotbind
//! library. Import this module to get quick access to the essential types for creating
//! compilations and inspecting what their references bound to.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dotbind operations
pub use crate::Error;

/// The result type used throughout dotbind
pub use crate::Result;

// ================================================================================================
// Compilations and References
// ================================================================================================

/// A named assembly and its external references
pub use crate::compilation::{Compilation, CompilationOptions};

/// External references and how they are consumed
pub use crate::compilation::{MetadataReference, MetadataReferenceProperties};

/// Resolution of dependencies no reference provides
pub use crate::compilation::{DirectoryResolver, MissingAssemblyResolver};

/// Problems reported while binding references
pub use crate::compilation::{Diagnostic, DiagnosticKind, DiagnosticSeverity};

// ================================================================================================
// Cache
// ================================================================================================

/// The process-wide metadata cache and its configuration
pub use crate::cache::{CacheConfig, MetadataCache};

/// Identity of one version of a file on disk
pub use crate::file::FileKey;

// ================================================================================================
// Metadata and Symbols
// ================================================================================================

/// Parsed metadata and assembly identities
pub use crate::metadata::{
    identity::{AssemblyIdentity, AssemblyVersion},
    AssemblyMetadata, MetadataImageKind, ModuleMetadata,
};

/// Assembly and module symbols
pub use crate::symbols::{
    AssemblySymbol, MissingAssemblySymbol, ModuleSymbol, PeAssemblySymbol, PeModuleSymbol,
    RetargetingAssemblySymbol, SourceAssemblySymbol,
};
