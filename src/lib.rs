// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # dotbind
//!
//! [![Crates.io](https://img.shields.io/crates/v/dotbind.svg)](https://crates.io/crates/dotbind)
//! [![Documentation](https://docs.rs/dotbind/badge.svg)](https://docs.rs/dotbind)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/dotbind/blob/main/LICENSE-APACHE)
//!
//! A process-wide metadata reference cache and reference manager for .NET assemblies and
//! netmodules. `dotbind` reads the ECMA-335 metadata that reference binding depends on, shares
//! it between every compilation of the process, and binds the references of a compilation into
//! a graph of assembly and module symbols.
//!
//! ## Features
//!
//! - **📦 Shared metadata** - Each file is parsed once per version on disk and shared by every
//!   compilation referencing it
//! - **♻️ Weak symbol tables** - Symbols are reused across compilations that bind a file the same
//!   way, and released as soon as the last compilation using them is gone
//! - **🔗 Reference binding** - Duplicate elimination, alias merging, version unification,
//!   core library selection and missing assembly resolution
//! - **🧵 Thread safe** - Binding runs exactly once per compilation, whichever thread asks first
//! - **🔧 No .NET toolchain** - Metadata images for tests and tools can be written with
//!   [`metadata::MetadataImageBuilder`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotbind::prelude::*;
//!
//! let mscorlib = MetadataReference::file("refs/mscorlib.dll");
//! let system = MetadataReference::file("refs/System.dll");
//!
//! let compilation = Compilation::create(
//!     "App",
//!     vec![mscorlib.clone(), system.clone()],
//!     CompilationOptions::default(),
//! );
//!
//! println!("core library: {}", compilation.corlib());
//! for diagnostic in compilation.diagnostics().iter() {
//!     println!("{diagnostic}");
//! }
//! # Ok::<(), dotbind::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`file`] - File access and the [`file::FileKey`] identifying one version of a file
//! - [`metadata`] - Metadata root, streams and tables, assembly identities and the image writer
//! - [`cache`] - The [`cache::MetadataCache`] and its weak symbol tables
//! - [`symbols`] - Assembly and module symbols: source, metadata backed, retargeting and missing
//! - [`compilation`] - Compilations, their references and the reference manager
//! - [`Error`] and [`Result`] - Error handling
//!
//! ### Sharing and lifetime
//!
//! The cache holds metadata strongly and symbols weakly. A compilation holds every symbol it
//! bound, so symbols live exactly as long as some compilation uses them. Entries whose metadata
//! and symbols are no longer used are evicted by compaction, either on a background timer or
//! through [`cache::MetadataCache::trigger_cache_compact`].
//!
//! ```rust,no_run
//! use dotbind::cache::{CacheConfig, MetadataCache};
//! use dotbind::compilation::{Compilation, CompilationOptions, MetadataReference};
//!
//! let cache = MetadataCache::new(CacheConfig::manual());
//! let options = CompilationOptions::default().with_cache(cache.clone());
//!
//! let compilation = Compilation::create(
//!     "App",
//!     vec![MetadataReference::file("refs/mscorlib.dll")],
//!     options,
//! );
//! compilation.assembly();
//! assert_eq!(cache.assemblies_from_files().len(), 1);
//!
//! drop(compilation);
//! cache.trigger_cache_compact();
//! assert!(cache.assemblies_from_files().is_empty());
//! ```

#[macro_use]
pub(crate) mod error;

/// File access and file identity.
///
/// Files are memory mapped or wrapped from an owned buffer, and the metadata root is located
/// inside PE images as well as in standalone metadata images. [`file::FileKey`] identifies one
/// version of a file on disk and keys the [`cache::MetadataCache`].
pub mod file;

/// Reading and writing the ECMA-335 metadata reference binding depends on.
///
/// # Key Components
///
/// - [`metadata::ModuleMetadata`] - name, MVID, `AssemblyRef`s and file list of one module
/// - [`metadata::AssemblyMetadata`] - the modules of one assembly
/// - [`metadata::identity`] - assembly identities, versions and strong names
/// - [`metadata::MetadataImageBuilder`] - writer for standalone metadata images
pub mod metadata;

/// The process-wide metadata cache.
///
/// See [`cache::MetadataCache`].
pub mod cache;

/// Assembly and module symbols.
pub mod symbols;

/// Compilations and reference binding.
///
/// See [`compilation::Compilation`].
pub mod compilation;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use dotbind::prelude::*;
///
/// let compilation = Compilation::create("App", Vec::new(), CompilationOptions::default());
/// assert!(compilation.corlib().is_corlib());
/// ```
pub mod prelude;

/// `dotbind` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use dotbind::{metadata::AssemblyMetadata, Result};
///
/// fn load(path: &str) -> Result<AssemblyMetadata> {
///     AssemblyMetadata::from_file(std::path::Path::new(path))
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `dotbind` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use dotbind::{metadata::AssemblyMetadata, Error};
///
/// match AssemblyMetadata::from_file(std::path::Path::new("Lib.dll")) {
///     Ok(assembly) => println!("Loaded {}", assembly.identity()),
///     Err(Error::NotSupported) => println!("Not a metadata image"),
///     Err(Error::Malformed { message, .. }) => println!("Malformed: {}", message),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

pub use cache::{CacheConfig, MetadataCache};
pub use compilation::{Compilation, CompilationOptions, MetadataReference};
pub use file::{File, FileKey};
pub use metadata::{identity::AssemblyIdentity, AssemblyMetadata, ModuleMetadata};
