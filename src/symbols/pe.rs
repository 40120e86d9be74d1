use std::sync::{Arc, OnceLock};

use crate::{
    metadata::{identity::AssemblyIdentity, AssemblyMetadata, ModuleMetadata},
    symbols::{
        resolve_links, AssemblyLink, AssemblySymbol, MissingAssemblySymbol, WeakAssemblySymbol,
    },
};

/// An assembly loaded from metadata, bound in one reference context.
///
/// Created unbound; the reference manager sets the core library and the links of every module
/// exactly once, right after creation.
pub struct PeAssemblySymbol {
    metadata: Arc<AssemblyMetadata>,
    modules: Vec<Arc<PeModuleSymbol>>,
    corlib: OnceLock<AssemblyLink>,
    is_linked: bool,
}

/// A module loaded from metadata: one module of a [`PeAssemblySymbol`], or a netmodule added to
/// a compilation
pub struct PeModuleSymbol {
    metadata: Arc<ModuleMetadata>,
    containing: WeakAssemblySymbol,
    ordinal: usize,
    references: OnceLock<Vec<AssemblyLink>>,
}

impl PeAssemblySymbol {
    /// Create an unbound symbol over `metadata`, with one module symbol per metadata module
    ///
    /// # Arguments
    /// * `metadata`    - The assembly
    /// * `is_linked`   - Whether the assembly is referenced for type embedding
    #[must_use]
    pub fn new(metadata: Arc<AssemblyMetadata>, is_linked: bool) -> Arc<PeAssemblySymbol> {
        Arc::new_cyclic(|this| {
            let containing = WeakAssemblySymbol::Pe(this.clone());
            let modules = metadata
                .modules()
                .iter()
                .enumerate()
                .map(|(ordinal, module)| {
                    PeModuleSymbol::new(module.clone(), containing.clone(), ordinal)
                })
                .collect();

            PeAssemblySymbol {
                metadata,
                modules,
                corlib: OnceLock::new(),
                is_linked,
            }
        })
    }

    /// The metadata this symbol is built over
    #[must_use]
    pub fn metadata(&self) -> &Arc<AssemblyMetadata> {
        &self.metadata
    }

    /// The assembly identity
    #[must_use]
    pub fn identity(&self) -> &AssemblyIdentity {
        self.metadata.identity()
    }

    /// One module symbol per metadata module, in file order
    #[must_use]
    pub fn modules(&self) -> &[Arc<PeModuleSymbol>] {
        &self.modules
    }

    /// The core library; the missing core library while unbound
    #[must_use]
    pub fn corlib(&self) -> AssemblySymbol {
        match self.corlib.get() {
            Some(link) => link.resolve_corlib(),
            None => AssemblySymbol::Missing(MissingAssemblySymbol::missing_corlib()),
        }
    }

    /// Whether this assembly is its own core library
    #[must_use]
    pub fn is_corlib(&self) -> bool {
        matches!(
            self.corlib.get(),
            Some(AssemblyLink::Bound(WeakAssemblySymbol::Pe(corlib))) if std::ptr::eq(corlib.as_ptr(), self)
        )
    }

    /// Whether the assembly is referenced for type embedding
    #[must_use]
    pub fn is_linked(&self) -> bool {
        self.is_linked
    }

    pub(crate) fn corlib_link(&self) -> Option<&AssemblyLink> {
        self.corlib.get()
    }

    pub(crate) fn set_corlib(&self, link: AssemblyLink) {
        let _ = self.corlib.set(link);
    }
}

impl PeModuleSymbol {
    pub(crate) fn new(
        metadata: Arc<ModuleMetadata>,
        containing: WeakAssemblySymbol,
        ordinal: usize,
    ) -> Arc<PeModuleSymbol> {
        Arc::new(PeModuleSymbol {
            metadata,
            containing,
            ordinal,
            references: OnceLock::new(),
        })
    }

    /// The metadata this symbol is built over
    #[must_use]
    pub fn metadata(&self) -> &Arc<ModuleMetadata> {
        &self.metadata
    }

    /// The module name
    #[must_use]
    pub fn name(&self) -> &str {
        self.metadata.name()
    }

    /// Position of the module within its containing assembly
    #[must_use]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// The `AssemblyRef` rows of the module
    #[must_use]
    pub fn referenced_assemblies(&self) -> &[AssemblyIdentity] {
        self.metadata.assembly_references()
    }

    /// What every `AssemblyRef` bound to
    #[must_use]
    pub fn referenced_assembly_symbols(&self) -> Vec<AssemblySymbol> {
        resolve_links(
            self.references.get().map(Vec::as_slice).unwrap_or_default(),
            self.referenced_assemblies(),
        )
    }

    /// The assembly this module belongs to
    #[must_use]
    pub fn containing_assembly(&self) -> Option<AssemblySymbol> {
        self.containing.upgrade()
    }

    /// The core library of the containing assembly
    #[must_use]
    pub fn corlib(&self) -> AssemblySymbol {
        match self.containing_assembly() {
            Some(assembly) => assembly.corlib(),
            None => AssemblySymbol::Missing(MissingAssemblySymbol::missing_corlib()),
        }
    }

    pub(crate) fn reference_links(&self) -> Option<&[AssemblyLink]> {
        self.references.get().map(Vec::as_slice)
    }

    pub(crate) fn set_references(&self, links: Vec<AssemblyLink>) {
        let _ = self.references.set(links);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataImageBuilder;

    fn assembly(name: &str, references: &[&str]) -> Arc<AssemblyMetadata> {
        let mut builder = MetadataImageBuilder::new()
            .module(format!("{name}.dll"))
            .assembly(AssemblyIdentity::parse(name).unwrap());
        for reference in references {
            builder = builder.assembly_ref(AssemblyIdentity::parse(reference).unwrap());
        }

        Arc::new(AssemblyMetadata::from_mem(builder.build().unwrap()).unwrap())
    }

    #[test]
    fn unbound() {
        let symbol = PeAssemblySymbol::new(assembly("Lib", &["mscorlib"]), false);

        assert_eq!(symbol.identity().name, "Lib");
        assert_eq!(symbol.modules().len(), 1);
        assert!(!symbol.is_corlib());
        assert!(symbol.corlib().is_missing());

        let module = &symbol.modules()[0];
        assert_eq!(module.name(), "Lib.dll");
        assert_eq!(module.ordinal(), 0);
        assert!(module
            .containing_assembly()
            .unwrap()
            .ptr_eq(&AssemblySymbol::Pe(symbol.clone())));

        let references = module.referenced_assembly_symbols();
        assert_eq!(references.len(), 1);
        assert!(references[0].is_missing());
        assert_eq!(references[0].name(), "mscorlib");
    }

    #[test]
    fn bound_once() {
        let corlib = PeAssemblySymbol::new(assembly("mscorlib", &[]), false);
        let corlib_symbol = AssemblySymbol::Pe(corlib.clone());
        corlib.set_corlib(AssemblyLink::to(&corlib_symbol));
        assert!(corlib.is_corlib());
        assert!(corlib_symbol.is_corlib());

        let lib = PeAssemblySymbol::new(assembly("Lib", &["mscorlib"]), true);
        lib.set_corlib(AssemblyLink::to(&corlib_symbol));
        lib.modules()[0].set_references(vec![AssemblyLink::to(&corlib_symbol)]);

        // later attempts are ignored
        lib.set_corlib(AssemblyLink::Missing(MissingAssemblySymbol::missing_corlib()));
        lib.modules()[0].set_references(Vec::new());

        assert!(lib.is_linked());
        assert!(!lib.is_corlib());
        assert!(lib.corlib().ptr_eq(&corlib_symbol));
        assert!(lib.modules()[0].corlib().ptr_eq(&corlib_symbol));
        assert!(lib.modules()[0].referenced_assembly_symbols()[0].ptr_eq(&corlib_symbol));
    }

    #[test]
    fn links_do_not_own() {
        let lib = PeAssemblySymbol::new(assembly("Lib", &["mscorlib"]), false);
        {
            let corlib = AssemblySymbol::Pe(PeAssemblySymbol::new(assembly("mscorlib", &[]), false));
            lib.set_corlib(AssemblyLink::to(&corlib));
            lib.modules()[0].set_references(vec![AssemblyLink::to(&corlib)]);
        }

        assert!(lib.corlib().is_missing());
        let references = lib.modules()[0].referenced_assembly_symbols();
        assert!(references[0].is_missing());
        assert_eq!(references[0].name(), "mscorlib");
    }
}
