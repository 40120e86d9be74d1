use std::sync::{Arc, OnceLock, Weak};

use crate::{
    metadata::identity::AssemblyIdentity,
    symbols::{
        resolve_links, AssemblyLink, AssemblySymbol, MissingAssemblySymbol, ModuleSymbol,
        PeModuleSymbol, SourceAssemblySymbol, SourceModuleSymbol, WeakAssemblySymbol,
    },
};

/// A compilation's source assembly as seen from a compilation that binds its references
/// differently.
///
/// The wrapper does not own the underlying assembly: the consuming compilation keeps the
/// referenced compilation, and with it the underlying assembly, alive. The referenced
/// compilation only tracks its wrappers weakly.
pub struct RetargetingAssemblySymbol {
    underlying: Weak<SourceAssemblySymbol>,
    identity: AssemblyIdentity,
    modules: Vec<ModuleSymbol>,
    corlib: OnceLock<AssemblyLink>,
    is_linked: bool,
}

/// The source module of a retargeted assembly
pub struct RetargetingModuleSymbol {
    underlying: Weak<SourceModuleSymbol>,
    name: String,
    identities: Vec<AssemblyIdentity>,
    assembly: Weak<RetargetingAssemblySymbol>,
    references: OnceLock<Vec<AssemblyLink>>,
}

impl RetargetingAssemblySymbol {
    /// Wrap `underlying`. The source module is wrapped, netmodules get fresh module symbols
    /// over the same metadata; all of them are bound by the consuming compilation.
    pub(crate) fn new(
        underlying: &Arc<SourceAssemblySymbol>,
        is_linked: bool,
    ) -> Arc<RetargetingAssemblySymbol> {
        Arc::new_cyclic(|this: &Weak<RetargetingAssemblySymbol>| {
            let containing = WeakAssemblySymbol::Retargeting(this.clone());
            let source_module = underlying.source_module();

            let mut modules = vec![ModuleSymbol::Retargeting(Arc::new(RetargetingModuleSymbol {
                underlying: Arc::downgrade(source_module),
                name: source_module.name().to_string(),
                identities: source_module.referenced_assemblies(),
                assembly: this.clone(),
                references: OnceLock::new(),
            }))];
            modules.extend(underlying.added_modules().iter().map(|module| {
                ModuleSymbol::Pe(PeModuleSymbol::new(
                    module.metadata().clone(),
                    containing.clone(),
                    module.ordinal(),
                ))
            }));

            RetargetingAssemblySymbol {
                underlying: Arc::downgrade(underlying),
                identity: underlying.identity().clone(),
                modules,
                corlib: OnceLock::new(),
                is_linked,
            }
        })
    }

    /// The wrapped source assembly, if its compilation is still alive
    #[must_use]
    pub fn underlying_assembly(&self) -> Option<Arc<SourceAssemblySymbol>> {
        self.underlying.upgrade()
    }

    /// The identity of the underlying assembly
    #[must_use]
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.identity
    }

    /// The retargeting source module followed by the netmodules
    #[must_use]
    pub fn modules(&self) -> &[ModuleSymbol] {
        &self.modules
    }

    /// The core library in the consuming reference context
    #[must_use]
    pub fn corlib(&self) -> AssemblySymbol {
        match self.corlib.get() {
            Some(link) => link.resolve_corlib(),
            None => AssemblySymbol::Missing(MissingAssemblySymbol::missing_corlib()),
        }
    }

    /// Whether this wrapper is its own core library
    #[must_use]
    pub fn is_corlib(&self) -> bool {
        matches!(
            self.corlib.get(),
            Some(AssemblyLink::Bound(WeakAssemblySymbol::Retargeting(corlib))) if std::ptr::eq(corlib.as_ptr(), self)
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

impl RetargetingModuleSymbol {
    /// The wrapped source module, if its compilation is still alive
    #[must_use]
    pub fn underlying_module(&self) -> Option<Arc<SourceModuleSymbol>> {
        self.underlying.upgrade()
    }

    /// The module name of the underlying module
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The references of the underlying module
    #[must_use]
    pub fn referenced_assemblies(&self) -> &[AssemblyIdentity] {
        &self.identities
    }

    /// What the references bound to in the consuming reference context
    #[must_use]
    pub fn referenced_assembly_symbols(&self) -> Vec<AssemblySymbol> {
        resolve_links(
            self.references.get().map(Vec::as_slice).unwrap_or_default(),
            &self.identities,
        )
    }

    /// The retargeting assembly
    #[must_use]
    pub fn containing_assembly(&self) -> Option<AssemblySymbol> {
        self.assembly.upgrade().map(AssemblySymbol::Retargeting)
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
    use crate::metadata::identity::AssemblyVersion;

    #[test]
    fn wraps_without_owning() {
        let underlying = SourceAssemblySymbol::new("Lib", Weak::new(), &[]);
        let mscorlib = AssemblyIdentity::simple("mscorlib", AssemblyVersion::new(4, 0, 0, 0));
        underlying
            .source_module()
            .set_references(vec![mscorlib.clone()], Vec::new());

        let wrapper = RetargetingAssemblySymbol::new(&underlying, false);
        let symbol = AssemblySymbol::Retargeting(wrapper.clone());

        assert!(Arc::ptr_eq(&wrapper.underlying_assembly().unwrap(), &underlying));
        assert_eq!(wrapper.identity(), underlying.identity());
        assert_eq!(symbol.modules().len(), 1);

        let module = &symbol.modules()[0];
        assert_eq!(module.name(), "Lib.dll");
        assert_eq!(module.referenced_assemblies(), [mscorlib]);
        assert!(module.referenced_assembly_symbols()[0].is_missing());
        assert!(module.containing_assembly().unwrap().ptr_eq(&symbol));

        wrapper.set_corlib(AssemblyLink::to(&symbol));
        assert!(wrapper.is_corlib());

        drop(underlying);
        assert!(wrapper.underlying_assembly().is_none());
        assert_eq!(wrapper.identity().name, "Lib");
    }
}
