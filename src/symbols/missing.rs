use std::sync::{Arc, OnceLock, Weak};

use crate::{
    metadata::identity::{AssemblyIdentity, AssemblyVersion},
    symbols::AssemblySymbol,
};

/// Stand-in for an assembly a reference could not be bound to
#[derive(Debug)]
pub struct MissingAssemblySymbol {
    identity: AssemblyIdentity,
    module: Arc<MissingModuleSymbol>,
    is_corlib: bool,
}

/// The single module of a [`MissingAssemblySymbol`]
#[derive(Debug)]
pub struct MissingModuleSymbol {
    name: String,
    assembly: Weak<MissingAssemblySymbol>,
}

static MISSING_CORLIB: OnceLock<Arc<MissingAssemblySymbol>> = OnceLock::new();

impl MissingAssemblySymbol {
    /// Create a missing assembly named `identity`
    #[must_use]
    pub fn new(identity: AssemblyIdentity) -> Arc<MissingAssemblySymbol> {
        Self::create(identity, false)
    }

    /// The shared missing core library, used when no reference provides one
    #[must_use]
    pub fn missing_corlib() -> Arc<MissingAssemblySymbol> {
        MISSING_CORLIB
            .get_or_init(|| {
                Self::create(
                    AssemblyIdentity::simple("<Missing Core Assembly>", AssemblyVersion::UNKNOWN),
                    true,
                )
            })
            .clone()
    }

    fn create(identity: AssemblyIdentity, is_corlib: bool) -> Arc<MissingAssemblySymbol> {
        Arc::new_cyclic(|assembly| MissingAssemblySymbol {
            module: Arc::new(MissingModuleSymbol {
                name: identity.name.clone(),
                assembly: assembly.clone(),
            }),
            identity,
            is_corlib,
        })
    }

    /// The identity that could not be found
    #[must_use]
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.identity
    }

    /// Whether this is the shared missing core library
    #[must_use]
    pub fn is_missing_corlib(&self) -> bool {
        self.is_corlib
    }

    /// The placeholder module
    #[must_use]
    pub fn module(&self) -> Arc<MissingModuleSymbol> {
        self.module.clone()
    }

    /// Always the missing core library
    #[must_use]
    pub fn corlib(&self) -> AssemblySymbol {
        AssemblySymbol::Missing(Self::missing_corlib())
    }
}

impl MissingModuleSymbol {
    /// The module name, the simple name of the missing assembly
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The missing assembly
    #[must_use]
    pub fn containing_assembly(&self) -> Option<AssemblySymbol> {
        self.assembly.upgrade().map(AssemblySymbol::Missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_corlib_is_shared() {
        let first = MissingAssemblySymbol::missing_corlib();
        let second = MissingAssemblySymbol::missing_corlib();

        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_missing_corlib());
        assert!(AssemblySymbol::Missing(first).is_corlib());
    }

    #[test]
    fn missing_assembly() {
        let identity = AssemblyIdentity::parse("Gone, Version=2.0.0.0").unwrap();
        let symbol = AssemblySymbol::Missing(MissingAssemblySymbol::new(identity.clone()));

        assert!(symbol.is_missing());
        assert!(!symbol.is_corlib());
        assert_eq!(symbol.identity(), &identity);

        let modules = symbol.modules();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].name(), "Gone");
        assert!(modules[0].containing_assembly().unwrap().ptr_eq(&symbol));
        assert!(modules[0].referenced_assemblies().is_empty());
    }
}
