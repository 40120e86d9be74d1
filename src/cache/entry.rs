use std::sync::Arc;

use crate::{
    cache::WeakList,
    file::FileKey,
    metadata::{AssemblyMetadata, ModuleMetadata},
    symbols::{PeAssemblySymbol, PeModuleSymbol},
};

/// A cached assembly: its metadata and the symbols built from it.
///
/// Handed out by the cache as a snapshot; the metadata is shared, the symbol list is a copy
/// of the weak references at the time of the snapshot.
#[derive(Debug, Clone)]
pub struct CachedAssembly {
    /// Key the entry is stored under
    pub key: FileKey,
    /// The parsed assembly
    pub metadata: Arc<AssemblyMetadata>,
    /// Symbols built over `metadata`
    pub cached_symbols: WeakList<PeAssemblySymbol>,
}

/// A cached netmodule: its metadata and the module symbols built from it.
#[derive(Debug, Clone)]
pub struct CachedModule {
    /// Key the entry is stored under
    pub key: FileKey,
    /// The parsed module
    pub metadata: Arc<ModuleMetadata>,
    /// Symbols built over `metadata`
    pub cached_symbols: WeakList<PeModuleSymbol>,
}

impl CachedAssembly {
    pub(crate) fn new(key: FileKey, metadata: Arc<AssemblyMetadata>) -> Self {
        CachedAssembly {
            key,
            metadata,
            cached_symbols: WeakList::new(),
        }
    }

    /// Number of symbol entries, dead ones included
    #[must_use]
    pub fn cached_symbol_count(&self) -> usize {
        self.cached_symbols.weak_count()
    }
}

impl CachedModule {
    pub(crate) fn new(key: FileKey, metadata: Arc<ModuleMetadata>) -> Self {
        CachedModule {
            key,
            metadata,
            cached_symbols: WeakList::new(),
        }
    }

    /// Number of symbol entries, dead ones included
    #[must_use]
    pub fn cached_symbol_count(&self) -> usize {
        self.cached_symbols.weak_count()
    }
}

/// Entries that can be evicted once nothing outside the cache uses them
pub(crate) trait Evictable {
    /// Drop dead symbol references, returning how many were dropped
    fn compact_symbols(&mut self) -> usize;

    /// Whether no symbol is alive and the cache holds the only reference to the metadata
    fn is_unused(&self) -> bool;
}

impl Evictable for CachedAssembly {
    fn compact_symbols(&mut self) -> usize {
        self.cached_symbols.compact()
    }

    fn is_unused(&self) -> bool {
        self.cached_symbols.is_empty_of_live() && Arc::strong_count(&self.metadata) == 1
    }
}

impl Evictable for CachedModule {
    fn compact_symbols(&mut self) -> usize {
        self.cached_symbols.compact()
    }

    fn is_unused(&self) -> bool {
        self.cached_symbols.is_empty_of_live() && Arc::strong_count(&self.metadata) == 1
    }
}
