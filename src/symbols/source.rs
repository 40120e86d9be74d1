use std::sync::{Arc, OnceLock, Weak};

use crate::{
    compilation::Compilation,
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion},
        ModuleMetadata,
    },
    symbols::{
        resolve_links, AssemblyLink, AssemblySymbol, MissingAssemblySymbol, ModuleSymbol,
        PeModuleSymbol, WeakAssemblySymbol,
    },
};

/// The assembly a compilation builds.
///
/// Its modules are the source module followed by the netmodules the compilation references, in
/// reference order.
pub struct SourceAssemblySymbol {
    identity: AssemblyIdentity,
    compilation: Weak<Compilation>,
    source_module: Arc<SourceModuleSymbol>,
    added_modules: Vec<Arc<PeModuleSymbol>>,
    corlib: OnceLock<AssemblyLink>,
}

/// The module compiled from source
pub struct SourceModuleSymbol {
    name: String,
    assembly: Weak<SourceAssemblySymbol>,
    references: OnceLock<ModuleReferences>,
}

struct ModuleReferences {
    identities: Vec<AssemblyIdentity>,
    links: Vec<AssemblyLink>,
}

impl SourceAssemblySymbol {
    pub(crate) fn new(
        name: &str,
        compilation: Weak<Compilation>,
        added_modules: &[Arc<ModuleMetadata>],
    ) -> Arc<SourceAssemblySymbol> {
        Arc::new_cyclic(|this: &Weak<SourceAssemblySymbol>| {
            let containing = WeakAssemblySymbol::Source(this.clone());

            SourceAssemblySymbol {
                identity: AssemblyIdentity::simple(name, AssemblyVersion::UNKNOWN),
                compilation,
                source_module: Arc::new(SourceModuleSymbol {
                    name: format!("{name}.dll"),
                    assembly: this.clone(),
                    references: OnceLock::new(),
                }),
                added_modules: added_modules
                    .iter()
                    .enumerate()
                    .map(|(index, module)| {
                        PeModuleSymbol::new(module.clone(), containing.clone(), index + 1)
                    })
                    .collect(),
                corlib: OnceLock::new(),
            }
        })
    }

    /// The identity of the assembly: the compilation name, version `0.0.0.0`
    #[must_use]
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.identity
    }

    /// The compilation building this assembly, if it is still alive
    #[must_use]
    pub fn compilation(&self) -> Option<Arc<Compilation>> {
        self.compilation.upgrade()
    }

    /// The module compiled from source
    #[must_use]
    pub fn source_module(&self) -> &Arc<SourceModuleSymbol> {
        &self.source_module
    }

    /// The referenced netmodules, in reference order
    #[must_use]
    pub fn added_modules(&self) -> &[Arc<PeModuleSymbol>] {
        &self.added_modules
    }

    /// The source module followed by the added modules
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleSymbol> {
        std::iter::once(ModuleSymbol::Source(self.source_module.clone()))
            .chain(self.added_modules.iter().cloned().map(ModuleSymbol::Pe))
            .collect()
    }

    /// The core library of the compilation
    #[must_use]
    pub fn corlib(&self) -> AssemblySymbol {
        match self.corlib.get() {
            Some(link) => link.resolve_corlib(),
            None => AssemblySymbol::Missing(MissingAssemblySymbol::missing_corlib()),
        }
    }

    /// Whether the compilation is its own core library
    #[must_use]
    pub fn is_corlib(&self) -> bool {
        matches!(
            self.corlib.get(),
            Some(AssemblyLink::Bound(WeakAssemblySymbol::Source(corlib))) if std::ptr::eq(corlib.as_ptr(), self)
        )
    }

    pub(crate) fn corlib_link(&self) -> Option<&AssemblyLink> {
        self.corlib.get()
    }

    pub(crate) fn set_corlib(&self, link: AssemblyLink) {
        let _ = self.corlib.set(link);
    }
}

impl SourceModuleSymbol {
    /// The module name, `<compilation name>.dll`
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The assemblies the compilation references, in reference order
    #[must_use]
    pub fn referenced_assemblies(&self) -> Vec<AssemblyIdentity> {
        self.references
            .get()
            .map(|references| references.identities.clone())
            .unwrap_or_default()
    }

    /// The symbols of the referenced assemblies, parallel to
    /// [`SourceModuleSymbol::referenced_assemblies`]
    #[must_use]
    pub fn referenced_assembly_symbols(&self) -> Vec<AssemblySymbol> {
        match self.references.get() {
            Some(references) => resolve_links(&references.links, &references.identities),
            None => Vec::new(),
        }
    }

    /// The source assembly
    #[must_use]
    pub fn containing_assembly(&self) -> Option<AssemblySymbol> {
        self.assembly.upgrade().map(AssemblySymbol::Source)
    }

    pub(crate) fn reference_links(&self) -> Option<(&[AssemblyIdentity], &[AssemblyLink])> {
        self.references
            .get()
            .map(|references| (references.identities.as_slice(), references.links.as_slice()))
    }

    pub(crate) fn set_references(&self, identities: Vec<AssemblyIdentity>, links: Vec<AssemblyLink>) {
        let _ = self.references.set(ModuleReferences { identities, links });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataImageBuilder;

    #[test]
    fn shape() {
        let netmodule = Arc::new(
            ModuleMetadata::from_mem(
                MetadataImageBuilder::new()
                    .module("Part.netmodule")
                    .build()
                    .unwrap(),
            )
            .unwrap(),
        );
        let assembly = SourceAssemblySymbol::new("App", Weak::new(), &[netmodule]);
        let symbol = AssemblySymbol::Source(assembly.clone());

        assert_eq!(assembly.identity().name, "App");
        assert!(assembly.identity().version.is_unknown());
        assert!(assembly.compilation().is_none());

        let modules = symbol.modules();
        assert_eq!(modules.len(), 2);
        assert_eq!(modules[0].name(), "App.dll");
        assert_eq!(modules[1].name(), "Part.netmodule");
        for module in &modules {
            assert!(module.containing_assembly().unwrap().ptr_eq(&symbol));
        }
        assert_eq!(assembly.added_modules()[0].ordinal(), 1);
    }

    #[test]
    fn own_corlib() {
        let assembly = SourceAssemblySymbol::new("corlib", Weak::new(), &[]);
        let symbol = AssemblySymbol::Source(assembly.clone());

        assert!(!assembly.is_corlib());
        assembly.set_corlib(AssemblyLink::to(&symbol));
        assembly.source_module().set_references(Vec::new(), Vec::new());

        assert!(assembly.is_corlib());
        assert!(symbol.is_corlib());
        assert!(symbol.corlib().ptr_eq(&symbol));
        assert!(assembly.source_module().referenced_assemblies().is_empty());
    }
}
