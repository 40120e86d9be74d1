//! Assembly and module symbols.
//!
//! A symbol is the bound view of an assembly or module inside one reference context: besides
//! the metadata it knows which assembly every `AssemblyRef` resolved to and which assembly is
//! the core library. The same metadata can therefore have several symbols, one per distinct
//! binding, and a symbol is only shared between compilations whose bindings agree.
//!
//! # Kinds
//!
//! - [`SourceAssemblySymbol`] / [`SourceModuleSymbol`] - the assembly a compilation builds
//! - [`PeAssemblySymbol`] / [`PeModuleSymbol`] - assemblies and netmodules loaded from metadata
//! - [`RetargetingAssemblySymbol`] / [`RetargetingModuleSymbol`] - another compilation's source
//!   assembly, seen from a reference context that binds its references differently
//! - [`MissingAssemblySymbol`] / [`MissingModuleSymbol`] - stand-ins for references that bound
//!   to nothing, including the shared missing core library
//!
//! # Ownership
//!
//! Assemblies own their modules. Everything else is weak: a module only points back at its
//! assembly, and the links from a module to the assemblies its references bound to do not keep
//! those assemblies alive. The compilation that created or reused a symbol holds it, together
//! with everything the symbol links to, in its bound references. Dropping the compilation
//! releases the whole graph; the cache only ever holds weak references.
//!
//! A link whose target is gone resolves to a fresh [`MissingAssemblySymbol`] with the identity
//! the reference asked for.

mod missing;
mod pe;
mod retargeting;
mod source;

use std::{
    fmt,
    sync::{Arc, Weak},
};

use crate::metadata::identity::AssemblyIdentity;

pub use missing::{MissingAssemblySymbol, MissingModuleSymbol};
pub use pe::{PeAssemblySymbol, PeModuleSymbol};
pub use retargeting::{RetargetingAssemblySymbol, RetargetingModuleSymbol};
pub use source::{SourceAssemblySymbol, SourceModuleSymbol};

/// An assembly symbol of any kind
#[derive(Clone)]
pub enum AssemblySymbol {
    /// The assembly of a compilation
    Source(Arc<SourceAssemblySymbol>),
    /// An assembly loaded from metadata
    Pe(Arc<PeAssemblySymbol>),
    /// A compilation's assembly in a different reference context
    Retargeting(Arc<RetargetingAssemblySymbol>),
    /// An assembly that could not be found
    Missing(Arc<MissingAssemblySymbol>),
}

/// A module symbol of any kind
#[derive(Clone)]
pub enum ModuleSymbol {
    /// The module of a compilation
    Source(Arc<SourceModuleSymbol>),
    /// A module loaded from metadata
    Pe(Arc<PeModuleSymbol>),
    /// A compilation's module in a different reference context
    Retargeting(Arc<RetargetingModuleSymbol>),
    /// The module of a missing assembly
    Missing(Arc<MissingModuleSymbol>),
}

/// Non-owning counterpart of [`AssemblySymbol`]
#[derive(Clone)]
pub enum WeakAssemblySymbol {
    /// See [`AssemblySymbol::Source`]
    Source(Weak<SourceAssemblySymbol>),
    /// See [`AssemblySymbol::Pe`]
    Pe(Weak<PeAssemblySymbol>),
    /// See [`AssemblySymbol::Retargeting`]
    Retargeting(Weak<RetargetingAssemblySymbol>),
    /// See [`AssemblySymbol::Missing`]
    Missing(Weak<MissingAssemblySymbol>),
}

impl AssemblySymbol {
    /// Whether `self` and `other` are the same symbol object
    #[must_use]
    pub fn ptr_eq(&self, other: &AssemblySymbol) -> bool {
        match (self, other) {
            (AssemblySymbol::Source(a), AssemblySymbol::Source(b)) => Arc::ptr_eq(a, b),
            (AssemblySymbol::Pe(a), AssemblySymbol::Pe(b)) => Arc::ptr_eq(a, b),
            (AssemblySymbol::Retargeting(a), AssemblySymbol::Retargeting(b)) => Arc::ptr_eq(a, b),
            (AssemblySymbol::Missing(a), AssemblySymbol::Missing(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The identity of the assembly
    #[must_use]
    pub fn identity(&self) -> &AssemblyIdentity {
        match self {
            AssemblySymbol::Source(symbol) => symbol.identity(),
            AssemblySymbol::Pe(symbol) => symbol.identity(),
            AssemblySymbol::Retargeting(symbol) => symbol.identity(),
            AssemblySymbol::Missing(symbol) => symbol.identity(),
        }
    }

    /// The simple name of the assembly
    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity().name
    }

    /// Whether this stands in for an assembly that could not be found
    #[must_use]
    pub fn is_missing(&self) -> bool {
        matches!(self, AssemblySymbol::Missing(_))
    }

    /// The modules of the assembly, manifest module first
    #[must_use]
    pub fn modules(&self) -> Vec<ModuleSymbol> {
        match self {
            AssemblySymbol::Source(symbol) => symbol.modules(),
            AssemblySymbol::Pe(symbol) => symbol
                .modules()
                .iter()
                .cloned()
                .map(ModuleSymbol::Pe)
                .collect(),
            AssemblySymbol::Retargeting(symbol) => symbol.modules().to_vec(),
            AssemblySymbol::Missing(symbol) => vec![ModuleSymbol::Missing(symbol.module())],
        }
    }

    /// The core library this assembly was bound against
    #[must_use]
    pub fn corlib(&self) -> AssemblySymbol {
        match self {
            AssemblySymbol::Source(symbol) => symbol.corlib(),
            AssemblySymbol::Pe(symbol) => symbol.corlib(),
            AssemblySymbol::Retargeting(symbol) => symbol.corlib(),
            AssemblySymbol::Missing(symbol) => symbol.corlib(),
        }
    }

    /// Whether this assembly is its own core library
    #[must_use]
    pub fn is_corlib(&self) -> bool {
        self.corlib().ptr_eq(self)
    }

    /// Whether types of this assembly are embedded into the referencing assembly
    #[must_use]
    pub fn is_linked(&self) -> bool {
        match self {
            AssemblySymbol::Pe(symbol) => symbol.is_linked(),
            AssemblySymbol::Retargeting(symbol) => symbol.is_linked(),
            AssemblySymbol::Source(_) | AssemblySymbol::Missing(_) => false,
        }
    }

    pub(crate) fn corlib_link(&self) -> Option<&AssemblyLink> {
        match self {
            AssemblySymbol::Source(symbol) => symbol.corlib_link(),
            AssemblySymbol::Pe(symbol) => symbol.corlib_link(),
            AssemblySymbol::Retargeting(symbol) => symbol.corlib_link(),
            AssemblySymbol::Missing(_) => None,
        }
    }

    pub(crate) fn set_corlib(&self, link: AssemblyLink) {
        match self {
            AssemblySymbol::Source(symbol) => symbol.set_corlib(link),
            AssemblySymbol::Pe(symbol) => symbol.set_corlib(link),
            AssemblySymbol::Retargeting(symbol) => symbol.set_corlib(link),
            AssemblySymbol::Missing(_) => {}
        }
    }

    /// A non-owning reference to this symbol
    #[must_use]
    pub fn downgrade(&self) -> WeakAssemblySymbol {
        match self {
            AssemblySymbol::Source(symbol) => WeakAssemblySymbol::Source(Arc::downgrade(symbol)),
            AssemblySymbol::Pe(symbol) => WeakAssemblySymbol::Pe(Arc::downgrade(symbol)),
            AssemblySymbol::Retargeting(symbol) => {
                WeakAssemblySymbol::Retargeting(Arc::downgrade(symbol))
            }
            AssemblySymbol::Missing(symbol) => WeakAssemblySymbol::Missing(Arc::downgrade(symbol)),
        }
    }
}

impl WeakAssemblySymbol {
    /// The symbol, if it is still alive
    #[must_use]
    pub fn upgrade(&self) -> Option<AssemblySymbol> {
        match self {
            WeakAssemblySymbol::Source(symbol) => symbol.upgrade().map(AssemblySymbol::Source),
            WeakAssemblySymbol::Pe(symbol) => symbol.upgrade().map(AssemblySymbol::Pe),
            WeakAssemblySymbol::Retargeting(symbol) => {
                symbol.upgrade().map(AssemblySymbol::Retargeting)
            }
            WeakAssemblySymbol::Missing(symbol) => symbol.upgrade().map(AssemblySymbol::Missing),
        }
    }
}

impl ModuleSymbol {
    /// Whether `self` and `other` are the same symbol object
    #[must_use]
    pub fn ptr_eq(&self, other: &ModuleSymbol) -> bool {
        match (self, other) {
            (ModuleSymbol::Source(a), ModuleSymbol::Source(b)) => Arc::ptr_eq(a, b),
            (ModuleSymbol::Pe(a), ModuleSymbol::Pe(b)) => Arc::ptr_eq(a, b),
            (ModuleSymbol::Retargeting(a), ModuleSymbol::Retargeting(b)) => Arc::ptr_eq(a, b),
            (ModuleSymbol::Missing(a), ModuleSymbol::Missing(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The module name
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            ModuleSymbol::Source(symbol) => symbol.name(),
            ModuleSymbol::Pe(symbol) => symbol.name(),
            ModuleSymbol::Retargeting(symbol) => symbol.name(),
            ModuleSymbol::Missing(symbol) => symbol.name(),
        }
    }

    /// The identities this module references, in `AssemblyRef` order
    #[must_use]
    pub fn referenced_assemblies(&self) -> Vec<AssemblyIdentity> {
        match self {
            ModuleSymbol::Source(symbol) => symbol.referenced_assemblies(),
            ModuleSymbol::Pe(symbol) => symbol.referenced_assemblies().to_vec(),
            ModuleSymbol::Retargeting(symbol) => symbol.referenced_assemblies().to_vec(),
            ModuleSymbol::Missing(_) => Vec::new(),
        }
    }

    /// The assemblies the references of this module bound to, parallel to
    /// [`ModuleSymbol::referenced_assemblies`]
    #[must_use]
    pub fn referenced_assembly_symbols(&self) -> Vec<AssemblySymbol> {
        match self {
            ModuleSymbol::Source(symbol) => symbol.referenced_assembly_symbols(),
            ModuleSymbol::Pe(symbol) => symbol.referenced_assembly_symbols(),
            ModuleSymbol::Retargeting(symbol) => symbol.referenced_assembly_symbols(),
            ModuleSymbol::Missing(_) => Vec::new(),
        }
    }

    /// The assembly containing this module, if it is still alive
    #[must_use]
    pub fn containing_assembly(&self) -> Option<AssemblySymbol> {
        match self {
            ModuleSymbol::Source(symbol) => symbol.containing_assembly(),
            ModuleSymbol::Pe(symbol) => symbol.containing_assembly(),
            ModuleSymbol::Retargeting(symbol) => symbol.containing_assembly(),
            ModuleSymbol::Missing(symbol) => symbol.containing_assembly(),
        }
    }

    pub(crate) fn reference_links(&self) -> Option<&[AssemblyLink]> {
        match self {
            ModuleSymbol::Source(symbol) => symbol.reference_links().map(|(_, links)| links),
            ModuleSymbol::Pe(symbol) => symbol.reference_links(),
            ModuleSymbol::Retargeting(symbol) => symbol.reference_links(),
            ModuleSymbol::Missing(_) => None,
        }
    }

    /// Bind the references of a metadata or retargeting module. Source modules carry their
    /// identities along with the links and are bound through
    /// [`SourceModuleSymbol::set_references`].
    pub(crate) fn set_reference_links(&self, links: Vec<AssemblyLink>) {
        match self {
            ModuleSymbol::Pe(symbol) => symbol.set_references(links),
            ModuleSymbol::Retargeting(symbol) => symbol.set_references(links),
            ModuleSymbol::Source(_) | ModuleSymbol::Missing(_) => {}
        }
    }
}

/// A bound reference, as stored inside a symbol
#[derive(Clone)]
pub(crate) enum AssemblyLink {
    /// The reference bound to an assembly owned by some compilation
    Bound(WeakAssemblySymbol),
    /// The reference bound to nothing
    Missing(Arc<MissingAssemblySymbol>),
}

impl AssemblyLink {
    pub(crate) fn to(symbol: &AssemblySymbol) -> AssemblyLink {
        match symbol {
            AssemblySymbol::Missing(missing) => AssemblyLink::Missing(missing.clone()),
            bound => AssemblyLink::Bound(bound.downgrade()),
        }
    }

    /// The linked symbol; a dead target becomes a missing assembly named `identity`
    pub(crate) fn resolve(&self, identity: &AssemblyIdentity) -> AssemblySymbol {
        match self {
            AssemblyLink::Bound(symbol) => symbol.upgrade().unwrap_or_else(|| {
                AssemblySymbol::Missing(MissingAssemblySymbol::new(identity.clone()))
            }),
            AssemblyLink::Missing(symbol) => AssemblySymbol::Missing(symbol.clone()),
        }
    }

    /// The linked core library; a dead target becomes the missing core library
    pub(crate) fn resolve_corlib(&self) -> AssemblySymbol {
        match self {
            AssemblyLink::Bound(symbol) => symbol.upgrade().unwrap_or_else(|| {
                AssemblySymbol::Missing(MissingAssemblySymbol::missing_corlib())
            }),
            AssemblyLink::Missing(symbol) => AssemblySymbol::Missing(symbol.clone()),
        }
    }

    /// Whether this link agrees with `expected`: the same live symbol, or missing on both
    /// sides
    pub(crate) fn matches(&self, expected: &AssemblySymbol) -> bool {
        match (self, expected) {
            (AssemblyLink::Missing(_), AssemblySymbol::Missing(_)) => true,
            (AssemblyLink::Bound(symbol), expected) if !expected.is_missing() => symbol
                .upgrade()
                .is_some_and(|symbol| symbol.ptr_eq(expected)),
            _ => false,
        }
    }
}

pub(crate) fn resolve_links(
    links: &[AssemblyLink],
    identities: &[AssemblyIdentity],
) -> Vec<AssemblySymbol> {
    identities
        .iter()
        .enumerate()
        .map(|(index, identity)| match links.get(index) {
            Some(link) => link.resolve(identity),
            None => AssemblySymbol::Missing(MissingAssemblySymbol::new(identity.clone())),
        })
        .collect()
}

impl fmt::Debug for AssemblySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            AssemblySymbol::Source(_) => "Source",
            AssemblySymbol::Pe(_) => "Pe",
            AssemblySymbol::Retargeting(_) => "Retargeting",
            AssemblySymbol::Missing(_) => "Missing",
        };
        write!(f, "{}AssemblySymbol({})", kind, self.identity())
    }
}

impl fmt::Debug for ModuleSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            ModuleSymbol::Source(_) => "Source",
            ModuleSymbol::Pe(_) => "Pe",
            ModuleSymbol::Retargeting(_) => "Retargeting",
            ModuleSymbol::Missing(_) => "Missing",
        };
        write!(f, "{}ModuleSymbol({})", kind, self.name())
    }
}

impl fmt::Display for AssemblySymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::identity::AssemblyVersion;

    fn missing(name: &str) -> AssemblySymbol {
        AssemblySymbol::Missing(MissingAssemblySymbol::new(AssemblyIdentity::simple(
            name,
            AssemblyVersion::new(1, 0, 0, 0),
        )))
    }

    #[test]
    fn ptr_eq_is_identity() {
        let a = missing("A");
        let same = a.clone();
        let other = missing("A");

        assert!(a.ptr_eq(&same));
        assert!(!a.ptr_eq(&other));
        assert_eq!(a.identity(), other.identity());
    }

    #[test]
    fn links() {
        let target = missing("Target");
        let identity = target.identity().clone();

        let link = AssemblyLink::to(&target);
        assert!(matches!(link, AssemblyLink::Missing(_)));
        assert!(link.matches(&missing("Other")));
        assert!(link.resolve(&identity).ptr_eq(&target));

        let corlib = AssemblySymbol::Missing(MissingAssemblySymbol::missing_corlib());
        assert!(corlib.is_missing());
        assert!(AssemblyLink::to(&corlib).resolve_corlib().ptr_eq(&corlib));
    }

    #[test]
    fn dead_links_resolve_to_missing() {
        let weak = {
            let symbol = missing("Gone");
            symbol.downgrade()
        };
        let link = AssemblyLink::Bound(weak);

        let identity = AssemblyIdentity::simple("Gone", AssemblyVersion::new(1, 0, 0, 0));
        let resolved = link.resolve(&identity);
        assert!(resolved.is_missing());
        assert_eq!(resolved.identity(), &identity);
        let corlib = AssemblySymbol::Missing(MissingAssemblySymbol::missing_corlib());
        assert!(link.resolve_corlib().ptr_eq(&corlib));

        let resolved = resolve_links(&[], &[identity.clone()]);
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].is_missing());
    }
}
