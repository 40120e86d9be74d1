//! Compilations and their reference manager.
//!
//! A [`Compilation`] is a named assembly under construction together with an ordered list of
//! external references: assembly and netmodule files, in-memory images, and other
//! compilations. Nothing is read when a compilation is created. The first query that needs the
//! referenced symbols binds every reference, exactly once, and all later queries are answered
//! from that result.
//!
//! # Binding
//!
//! Files are loaded through the [`MetadataCache`], so compilations referencing the same file
//! share its metadata. Symbols built over cached metadata are shared as well, as long as one is
//! still alive and was bound to the same assemblies and core library. A referenced compilation
//! that was bound differently is seen through a [`RetargetingAssemblySymbol`], which the
//! referenced compilation tracks weakly and hands out to every consumer with the same
//! bindings.
//!
//! Problems with individual references never fail the compilation. They are reported as
//! [`Diagnostic`]s, and references that could not be bound resolve to missing assembly
//! symbols.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotbind::compilation::{Compilation, CompilationOptions, MetadataReference};
//!
//! let mscorlib = MetadataReference::file("mscorlib.dll");
//! let lib = Compilation::create("Lib", vec![mscorlib.clone()], CompilationOptions::default());
//! let app = Compilation::create(
//!     "App",
//!     vec![mscorlib.clone(), MetadataReference::compilation(&lib)],
//!     CompilationOptions::default(),
//! );
//!
//! for assembly in app.referenced_assembly_symbols() {
//!     println!("{assembly}");
//! }
//! let corlib = app.get_referenced_assembly_symbol(&mscorlib)?;
//! # Ok::<(), dotbind::Error>(())
//! ```

mod binding;
mod diagnostics;
mod manager;
mod reference;
mod resolver;

use std::{
    fmt,
    sync::{Arc, Weak},
};

use parking_lot::Mutex;

use crate::{
    cache::{MetadataCache, WeakList},
    metadata::MetadataImageKind,
    symbols::{
        AssemblySymbol, MissingAssemblySymbol, ModuleSymbol, RetargetingAssemblySymbol,
        SourceAssemblySymbol, SourceModuleSymbol,
    },
    Error, Result,
};

pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticSeverity, Diagnostics};
pub use manager::ReferenceManagerState;
pub use reference::{ImageMetadata, MetadataImage, MetadataReference, MetadataReferenceProperties};
pub use resolver::{DirectoryResolver, MissingAssemblyResolver};

use manager::{BoundReferences, ReferenceBinding, ReferenceManager};

/// Options of a [`Compilation`]
#[derive(Clone)]
pub struct CompilationOptions {
    /// Cache file references are loaded through
    pub cache: Arc<MetadataCache>,
    /// Resolver consulted for dependencies no reference provides
    pub resolver: Option<Arc<dyn MissingAssemblyResolver>>,
    /// Whether `resolver` is consulted
    pub resolve_missing_assemblies: bool,
}

impl Default for CompilationOptions {
    fn default() -> Self {
        CompilationOptions {
            cache: MetadataCache::global(),
            resolver: None,
            resolve_missing_assemblies: false,
        }
    }
}

impl CompilationOptions {
    /// Load references through `cache` instead of the process-wide cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Resolve missing dependencies with `resolver`
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn MissingAssemblyResolver>) -> Self {
        self.resolver = Some(resolver);
        self.resolve_missing_assemblies = true;
        self
    }

    /// Enable or disable missing assembly resolution
    #[must_use]
    pub fn with_missing_assembly_resolution(mut self, enabled: bool) -> Self {
        self.resolve_missing_assemblies = enabled;
        self
    }
}

impl fmt::Debug for CompilationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompilationOptions")
            .field("cache", self.cache.config())
            .field("resolver", &self.resolver.is_some())
            .field("resolve_missing_assemblies", &self.resolve_missing_assemblies)
            .finish()
    }
}

/// A named assembly and its external references
pub struct Compilation {
    name: String,
    references: Vec<Arc<MetadataReference>>,
    options: CompilationOptions,
    manager: ReferenceManager,
    retargeting: Mutex<WeakList<RetargetingAssemblySymbol>>,
    this: Weak<Compilation>,
}

impl Compilation {
    /// Create a compilation. References are bound lazily, on the first query that needs them.
    ///
    /// # Arguments
    /// * `name`        - Simple name of the assembly being built
    /// * `references`  - External references, in declaration order
    /// * `options`     - Cache and missing assembly resolution
    pub fn create(
        name: impl Into<String>,
        references: impl IntoIterator<Item = Arc<MetadataReference>>,
        options: CompilationOptions,
    ) -> Arc<Compilation> {
        Arc::new_cyclic(|this| Compilation {
            name: name.into(),
            references: references.into_iter().collect(),
            options,
            manager: ReferenceManager::new(),
            retargeting: Mutex::new(WeakList::new()),
            this: this.clone(),
        })
    }

    /// Simple name of the assembly being built
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The options the compilation was created with
    #[must_use]
    pub fn options(&self) -> &CompilationOptions {
        &self.options
    }

    /// The explicit references, in declaration order
    #[must_use]
    pub fn external_references(&self) -> &[Arc<MetadataReference>] {
        &self.references
    }

    /// Progress of the reference manager
    #[must_use]
    pub fn reference_manager_state(&self) -> ReferenceManagerState {
        self.manager.state()
    }

    pub(crate) fn weak(&self) -> Weak<Compilation> {
        self.this.clone()
    }

    fn bound(&self) -> &BoundReferences {
        self.manager.bound(self)
    }

    /// The assembly being built. Binds the references on first use.
    #[must_use]
    pub fn assembly(&self) -> Arc<SourceAssemblySymbol> {
        self.bound().assembly.clone()
    }

    /// The module compiled from source
    #[must_use]
    pub fn source_module(&self) -> Arc<SourceModuleSymbol> {
        self.bound().assembly.source_module().clone()
    }

    /// The symbols of the referenced assemblies: surviving explicit references in declaration
    /// order, then implicit references
    #[must_use]
    pub fn referenced_assembly_symbols(&self) -> Vec<AssemblySymbol> {
        self.bound().referenced_assemblies.clone()
    }

    /// References added by the missing assembly resolver, in resolution order
    #[must_use]
    pub fn implicit_references(&self) -> Vec<Arc<MetadataReference>> {
        self.bound()
            .implicit
            .iter()
            .map(|(reference, _)| reference.clone())
            .collect()
    }

    /// The core library; the shared missing core library if no reference provides one
    #[must_use]
    pub fn corlib(&self) -> AssemblySymbol {
        self.bound().corlib.clone()
    }

    /// Assemblies referenced by bound modules that no reference provides, ordered by identity
    #[must_use]
    pub fn missing_assembly_symbols(&self) -> Vec<Arc<MissingAssemblySymbol>> {
        self.bound().missing.clone()
    }

    /// Diagnostics reported while binding the references
    #[must_use]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.bound().diagnostics
    }

    fn binding_of(&self, reference: &Arc<MetadataReference>) -> Option<&ReferenceBinding> {
        let index = self
            .references
            .iter()
            .rposition(|candidate| Arc::ptr_eq(candidate, reference))?;
        self.bound().explicit.get(index)
    }

    /// The assembly `reference` bound to.
    ///
    /// Returns `Ok(None)` if a later reference to the same assembly superseded `reference`.
    /// References added by the missing assembly resolver can be queried as well.
    ///
    /// # Errors
    /// - [`Error::NotAReference`] if `reference` is not a reference of this compilation
    /// - [`Error::ImageKindMismatch`] if `reference` is a netmodule
    /// - [`Error::MetadataRead`] if `reference` could not be loaded
    pub fn get_referenced_assembly_symbol(
        &self,
        reference: &Arc<MetadataReference>,
    ) -> Result<Option<AssemblySymbol>> {
        let Some(binding) = self.binding_of(reference) else {
            return match self.bound().implicit_symbol(reference) {
                Some(symbol) => Ok(Some(symbol.clone())),
                None => Err(Error::NotAReference(reference.display())),
            };
        };

        match binding {
            ReferenceBinding::Assembly { symbol, .. } => Ok(Some(symbol.clone())),
            ReferenceBinding::Superseded { .. } => Ok(None),
            ReferenceBinding::Module(_) => Err(Error::ImageKindMismatch(format!(
                "{} is a {}",
                reference,
                MetadataImageKind::Module
            ))),
            failed @ ReferenceBinding::Failed { .. } => {
                Err(failed.error().unwrap_or(Error::NotSupported))
            }
        }
    }

    /// The netmodule `reference` bound to
    ///
    /// # Errors
    /// - [`Error::NotAReference`] if `reference` is not a reference of this compilation
    /// - [`Error::ImageKindMismatch`] if `reference` is an assembly
    /// - [`Error::MetadataRead`] if `reference` could not be loaded
    pub fn get_referenced_module_symbol(
        &self,
        reference: &Arc<MetadataReference>,
    ) -> Result<ModuleSymbol> {
        let Some(binding) = self.binding_of(reference) else {
            return Err(Error::NotAReference(reference.display()));
        };

        match binding {
            ReferenceBinding::Module(module) => Ok(ModuleSymbol::Pe(module.clone())),
            ReferenceBinding::Assembly { .. } | ReferenceBinding::Superseded { .. } => {
                Err(Error::ImageKindMismatch(format!(
                    "{} is an {}",
                    reference,
                    MetadataImageKind::Assembly
                )))
            }
            failed @ ReferenceBinding::Failed { .. } => {
                Err(failed.error().unwrap_or(Error::NotSupported))
            }
        }
    }

    /// The extern aliases of `reference`, merged with those of the references it superseded.
    /// Empty for references in the global namespace only.
    ///
    /// # Errors
    /// The same as [`Compilation::get_referenced_assembly_symbol`]
    pub fn reference_aliases(&self, reference: &Arc<MetadataReference>) -> Result<Vec<String>> {
        let mut binding = self.binding_of(reference);
        while let Some(ReferenceBinding::Superseded { by }) = binding {
            binding = self.bound().explicit.get(*by);
        }

        match binding {
            Some(ReferenceBinding::Assembly { aliases, .. }) => Ok(aliases.clone()),
            _ => self.get_referenced_assembly_symbol(reference).map(|_| Vec::new()),
        }
    }

    /// Every extern alias declared by the references, in declaration order
    #[must_use]
    pub fn extern_aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = Vec::new();
        for binding in &self.bound().explicit {
            if let ReferenceBinding::Assembly {
                aliases: declared, ..
            } = binding
            {
                for alias in declared {
                    if alias != "global" && !aliases.contains(alias) {
                        aliases.push(alias.clone());
                    }
                }
            }
        }
        aliases
    }

    /// Live retargeting symbols other compilations created for this compilation's assembly
    #[must_use]
    pub fn retargeting_assembly_symbols(&self) -> Vec<Arc<RetargetingAssemblySymbol>> {
        self.retargeting.lock().live()
    }

    /// Number of retargeting symbol references, dead ones included
    #[must_use]
    pub fn retargeting_assembly_symbol_count(&self) -> usize {
        self.retargeting.lock().weak_count()
    }

    /// Drop references to retargeting symbols that are gone, returning how many were dropped
    pub fn compact_retargeting_assembly_symbols(&self) -> usize {
        self.retargeting.lock().compact()
    }

    pub(crate) fn find_retargeting_assembly_symbol<F>(
        &self,
        predicate: F,
    ) -> Option<Arc<RetargetingAssemblySymbol>>
    where
        F: FnMut(&Arc<RetargetingAssemblySymbol>) -> bool,
    {
        let candidates = self.retargeting.lock().live();
        candidates.into_iter().find(predicate)
    }

    pub(crate) fn add_retargeting_assembly_symbol(&self, symbol: &Arc<RetargetingAssemblySymbol>) {
        let mut retargeting = self.retargeting.lock();
        retargeting.compact();
        retargeting.add(symbol);
    }
}

impl fmt::Debug for Compilation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compilation")
            .field("name", &self.name)
            .field("references", &self.references.len())
            .field("state", &self.manager.state())
            .finish_non_exhaustive()
    }
}
