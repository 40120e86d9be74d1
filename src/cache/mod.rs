//! Process-wide cache of loaded metadata.
//!
//! Compilations that reference the same file share one parsed [`AssemblyMetadata`] or
//! [`ModuleMetadata`]. Entries are keyed by [`FileKey`], so a file that changed on disk is loaded
//! again under a new key instead of reusing stale content.
//!
//! Besides the metadata, every entry keeps a [`WeakList`] of the symbols built over it. A
//! compilation whose binding matches a live symbol reuses it rather than building a new one.
//! The cache never keeps symbols alive; once every compilation using a symbol is dropped, the
//! next compaction removes the dead reference and, if nothing else holds the metadata, the
//! whole entry.
//!
//! # Locking
//!
//! All cache state sits behind one re-entrant lock. Files are read and parsed without holding
//! it; a load re-checks the map before inserting, so concurrent loads of the same file converge
//! to the entry that was inserted first. Failed loads are never cached.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotbind::cache::{CacheConfig, MetadataCache};
//! use std::path::Path;
//!
//! let cache = MetadataCache::new(CacheConfig::manual());
//! let first = cache.get_or_load_assembly(Path::new("Lib.dll"))?;
//! let second = cache.get_or_load_assembly(Path::new("Lib.dll"))?;
//! assert!(std::sync::Arc::ptr_eq(&first.metadata, &second.metadata));
//! # Ok::<(), dotbind::Error>(())
//! ```

mod entry;
mod weak;

use std::{
    cell::RefCell,
    collections::HashMap,
    path::Path,
    sync::{Arc, OnceLock, Weak},
    thread,
    time::Duration,
};

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use tracing::{debug, info, trace, warn};

use crate::{
    file::FileKey,
    metadata::{AssemblyMetadata, MetadataImageKind, ModuleMetadata},
    symbols::{PeAssemblySymbol, PeModuleSymbol},
    Error, Result,
};

use entry::Evictable;
pub use entry::{CachedAssembly, CachedModule};
pub use weak::WeakList;

/// Configuration of a [`MetadataCache`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Interval of the background compaction thread, `None` disables it
    pub compaction_interval: Option<Duration>,
    /// Compare paths case-insensitively when building [`FileKey`]s
    pub case_insensitive_paths: bool,
    /// Load the file references of a compilation in parallel before binding
    pub parallel_preload: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            compaction_interval: Some(Duration::from_secs(30)),
            case_insensitive_paths: cfg!(windows),
            parallel_preload: true,
        }
    }
}

impl CacheConfig {
    /// Configuration without background compaction, for deterministic tests.
    ///
    /// Compaction only happens through [`MetadataCache::trigger_cache_compact`].
    #[must_use]
    pub fn manual() -> Self {
        Self {
            compaction_interval: None,
            ..Self::default()
        }
    }

    /// Set the background compaction interval
    #[must_use]
    pub fn with_compaction_interval(mut self, interval: Option<Duration>) -> Self {
        self.compaction_interval = interval;
        self
    }

    /// Set case-insensitive path comparison
    #[must_use]
    pub fn with_case_insensitive_paths(mut self, case_insensitive: bool) -> Self {
        self.case_insensitive_paths = case_insensitive;
        self
    }

    /// Enable or disable parallel loading of file references
    #[must_use]
    pub fn with_parallel_preload(mut self, parallel: bool) -> Self {
        self.parallel_preload = parallel;
        self
    }
}

/// What a compaction pass removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactionStats {
    /// Dead symbol references dropped from symbol tables
    pub symbols_removed: usize,
    /// Assembly entries evicted
    pub assemblies_evicted: usize,
    /// Module entries evicted
    pub modules_evicted: usize,
}

#[derive(Default)]
pub(crate) struct CacheState {
    assemblies: HashMap<FileKey, CachedAssembly>,
    modules: HashMap<FileKey, CachedModule>,
}

impl CacheState {
    fn clear(&mut self) {
        self.assemblies.clear();
        self.modules.clear();
    }
}

/// Holds the cache lock for its lifetime; see [`MetadataCache::lock_and_clean`]
#[must_use]
pub struct CacheLockGuard<'a> {
    guard: ReentrantMutexGuard<'a, RefCell<CacheState>>,
}

impl Drop for CacheLockGuard<'_> {
    fn drop(&mut self) {
        self.guard.borrow_mut().clear();
    }
}

/// The metadata cache.
///
/// Use [`MetadataCache::global`] for the process-wide instance, or [`MetadataCache::new`] for an
/// isolated one.
pub struct MetadataCache {
    config: CacheConfig,
    state: ReentrantMutex<RefCell<CacheState>>,
    compactor: OnceLock<()>,
    this: Weak<MetadataCache>,
}

static GLOBAL_CACHE: OnceLock<Arc<MetadataCache>> = OnceLock::new();

impl MetadataCache {
    /// Create an isolated cache
    #[must_use]
    pub fn new(config: CacheConfig) -> Arc<MetadataCache> {
        Arc::new_cyclic(|this| MetadataCache {
            config,
            state: ReentrantMutex::new(RefCell::new(CacheState::default())),
            compactor: OnceLock::new(),
            this: this.clone(),
        })
    }

    /// The process-wide cache, created with [`CacheConfig::default`] on first use
    #[must_use]
    pub fn global() -> Arc<MetadataCache> {
        GLOBAL_CACHE
            .get_or_init(|| MetadataCache::new(CacheConfig::default()))
            .clone()
    }

    /// The configuration of this cache
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Acquire the cache lock on this thread. Re-entrant; the caller must not keep a
    /// `RefCell` borrow across calls back into the cache.
    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<CacheState>> {
        self.state.lock()
    }

    /// Whether the calling thread holds the cache lock, e.g. inside a
    /// [`MetadataCache::lock_and_clean`] scope
    pub(crate) fn is_locked_by_current_thread(&self) -> bool {
        self.state.is_owned_by_current_thread()
    }

    fn key_for(&self, path: &Path) -> Result<FileKey> {
        FileKey::create_with(path, self.config.case_insensitive_paths)
            .map_err(|error| Error::metadata_read(path, error))
    }

    /// Return the cached assembly for `path`, loading it on a miss.
    ///
    /// # Errors
    /// Returns [`crate::Error::MetadataRead`] if the file does not exist or can not be parsed.
    /// The failure is not cached.
    pub fn get_or_load_assembly(&self, path: &Path) -> Result<CachedAssembly> {
        self.start_compactor();

        let key = self.key_for(path)?;
        if let Some(entry) = self.assembly_entry(&key) {
            debug!(path = %key, "assembly cache hit");
            return Ok(entry);
        }

        debug!(path = %key, "assembly cache miss");
        let metadata = AssemblyMetadata::from_file(key.full_path())
            .map_err(|error| Error::metadata_read(key.full_path(), error))?;

        let guard = self.lock();
        let mut state = guard.borrow_mut();
        let entry = state
            .assemblies
            .entry(key.clone())
            .or_insert_with(|| CachedAssembly::new(key, Arc::new(metadata)));

        Ok(entry.clone())
    }

    /// Return the cached module for `path`, loading it on a miss.
    ///
    /// Modules are cached separately from assemblies, loading the same path as both yields two
    /// entries.
    ///
    /// # Errors
    /// Returns [`crate::Error::MetadataRead`] if the file does not exist or can not be parsed
    pub fn get_or_load_module(&self, path: &Path) -> Result<CachedModule> {
        self.start_compactor();

        let key = self.key_for(path)?;
        if let Some(entry) = self.module_entry(&key) {
            debug!(path = %key, "module cache hit");
            return Ok(entry);
        }

        debug!(path = %key, "module cache miss");
        let metadata = ModuleMetadata::from_file(key.full_path())
            .map_err(|error| Error::metadata_read(key.full_path(), error))?;

        let guard = self.lock();
        let mut state = guard.borrow_mut();
        let entry = state
            .modules
            .entry(key.clone())
            .or_insert_with(|| CachedModule::new(key, Arc::new(metadata)));

        Ok(entry.clone())
    }

    /// Record `symbol` in the symbol table of the assembly entry `key`.
    ///
    /// Returns `false` if there is no such entry.
    pub fn register_assembly_symbol(&self, key: &FileKey, symbol: &Arc<PeAssemblySymbol>) -> bool {
        let guard = self.lock();
        let mut state = guard.borrow_mut();
        match state.assemblies.get_mut(key) {
            Some(entry) => {
                entry.cached_symbols.add(symbol);
                true
            }
            None => false,
        }
    }

    /// Record `symbol` in the symbol table of the module entry `key`.
    ///
    /// Returns `false` if there is no such entry.
    pub fn register_module_symbol(&self, key: &FileKey, symbol: &Arc<PeModuleSymbol>) -> bool {
        let guard = self.lock();
        let mut state = guard.borrow_mut();
        match state.modules.get_mut(key) {
            Some(entry) => {
                entry.cached_symbols.add(symbol);
                true
            }
            None => false,
        }
    }

    /// The first live symbol of the assembly entry `key` that satisfies `predicate`
    pub fn find_reusable_assembly_symbol<F>(
        &self,
        key: &FileKey,
        predicate: F,
    ) -> Option<Arc<PeAssemblySymbol>>
    where
        F: FnMut(&Arc<PeAssemblySymbol>) -> bool,
    {
        let candidates = {
            let guard = self.lock();
            let state = guard.borrow();
            state.assemblies.get(key)?.cached_symbols.live()
        };

        trace!(path = %key, candidates = candidates.len(), "scanning cached assembly symbols");
        candidates.into_iter().find(predicate)
    }

    /// The first live symbol of the module entry `key` that satisfies `predicate`
    pub fn find_reusable_module_symbol<F>(
        &self,
        key: &FileKey,
        predicate: F,
    ) -> Option<Arc<PeModuleSymbol>>
    where
        F: FnMut(&Arc<PeModuleSymbol>) -> bool,
    {
        let candidates = {
            let guard = self.lock();
            let state = guard.borrow();
            state.modules.get(key)?.cached_symbols.live()
        };

        trace!(path = %key, candidates = candidates.len(), "scanning cached module symbols");
        candidates.into_iter().find(predicate)
    }

    /// Drop dead symbol references and evict entries nothing uses anymore
    pub fn compact(&self) -> CompactionStats {
        let guard = self.lock();
        let mut state = guard.borrow_mut();

        let mut stats = CompactionStats::default();
        let (symbols_removed, evicted) = compact_map(&mut state.assemblies);
        stats.symbols_removed += symbols_removed;
        stats.assemblies_evicted = evicted;
        let (symbols_removed, evicted) = compact_map(&mut state.modules);
        stats.symbols_removed += symbols_removed;
        stats.modules_evicted = evicted;

        debug!(
            symbols = stats.symbols_removed,
            assemblies = stats.assemblies_evicted,
            modules = stats.modules_evicted,
            "compacted metadata cache"
        );

        stats
    }

    /// Run a compaction pass now, on the calling thread
    pub fn trigger_cache_compact(&self) -> CompactionStats {
        self.compact()
    }

    /// Take the cache lock and empty the cache.
    ///
    /// The lock is held on the calling thread until the guard is dropped, and the cache is
    /// emptied again on drop. Cache operations on the same thread proceed normally, other
    /// threads block until the guard is gone.
    pub fn lock_and_clean(&self) -> CacheLockGuard<'_> {
        let guard = self.lock();
        guard.borrow_mut().clear();
        CacheLockGuard { guard }
    }

    /// Snapshot of all assembly entries
    #[must_use]
    pub fn assemblies_from_files(&self) -> Vec<(FileKey, CachedAssembly)> {
        let guard = self.lock();
        let state = guard.borrow();
        state
            .assemblies
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Snapshot of all module entries
    #[must_use]
    pub fn modules_from_files(&self) -> Vec<(FileKey, CachedModule)> {
        let guard = self.lock();
        let state = guard.borrow();
        state
            .modules
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Snapshot of the assembly entry `key`
    #[must_use]
    pub fn assembly_entry(&self, key: &FileKey) -> Option<CachedAssembly> {
        let guard = self.lock();
        let state = guard.borrow();
        state.assemblies.get(key).cloned()
    }

    /// Snapshot of the module entry `key`
    #[must_use]
    pub fn module_entry(&self, key: &FileKey) -> Option<CachedModule> {
        let guard = self.lock();
        let state = guard.borrow();
        state.modules.get(key).cloned()
    }

    /// Number of symbol references (dead ones included) of the entry `key` of `kind`
    #[must_use]
    pub fn cached_symbol_count(&self, key: &FileKey, kind: MetadataImageKind) -> Option<usize> {
        let guard = self.lock();
        let state = guard.borrow();
        match kind {
            MetadataImageKind::Assembly => state
                .assemblies
                .get(key)
                .map(CachedAssembly::cached_symbol_count),
            MetadataImageKind::Module => {
                state.modules.get(key).map(CachedModule::cached_symbol_count)
            }
        }
    }

    fn start_compactor(&self) {
        let Some(interval) = self.config.compaction_interval else {
            return;
        };

        self.compactor.get_or_init(|| {
            let cache = self.this.clone();
            let spawned = thread::Builder::new()
                .name("dotbind-cache-compactor".to_string())
                .spawn(move || loop {
                    thread::sleep(interval);
                    let Some(cache) = cache.upgrade() else {
                        break;
                    };
                    cache.compact();
                });

            match spawned {
                Ok(_) => info!(?interval, "started metadata cache compaction thread"),
                Err(error) => warn!(%error, "failed to start metadata cache compaction thread"),
            }
        });
    }
}

fn compact_map<E: Evictable>(map: &mut HashMap<FileKey, E>) -> (usize, usize) {
    let mut symbols_removed = 0;
    for entry in map.values_mut() {
        symbols_removed += entry.compact_symbols();
    }

    let before = map.len();
    map.retain(|key, entry| {
        let unused = entry.is_unused();
        if unused {
            debug!(path = %key, "evicting cache entry");
        }
        !unused
    });

    (symbols_removed, before - map.len())
}
