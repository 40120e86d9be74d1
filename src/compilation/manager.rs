use std::{
    path::PathBuf,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc, OnceLock,
    },
};

use strum::Display;

use crate::{
    compilation::{binding, Compilation, Diagnostics, MetadataReference},
    symbols::{AssemblySymbol, MissingAssemblySymbol, PeModuleSymbol, SourceAssemblySymbol},
    Error,
};

/// Progress of the reference manager of a compilation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ReferenceManagerState {
    /// Nothing has been bound
    Uninitialized,
    /// The source assembly exists, its references are being bound
    AssemblySymbolCreated,
    /// Every reference is bound
    FullyBound,
}

impl ReferenceManagerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ReferenceManagerState::Uninitialized,
            1 => ReferenceManagerState::AssemblySymbolCreated,
            _ => ReferenceManagerState::FullyBound,
        }
    }
}

/// What one explicit reference bound to
pub(crate) enum ReferenceBinding {
    /// An assembly, with the aliases merged from its duplicates
    Assembly {
        symbol: AssemblySymbol,
        aliases: Vec<String>,
    },
    /// A later reference to the same assembly, at index `by`, took over
    Superseded { by: usize },
    /// A netmodule added to the source assembly
    Module(Arc<PeModuleSymbol>),
    /// The reference could not be loaded
    Failed { path: PathBuf, source: Arc<Error> },
}

impl ReferenceBinding {
    pub(crate) fn failed(path: impl Into<PathBuf>, error: Error) -> Self {
        let path = path.into();
        match Error::metadata_read(&path, error) {
            Error::MetadataRead { path, source } => ReferenceBinding::Failed { path, source },
            other => ReferenceBinding::Failed {
                path,
                source: Arc::new(other),
            },
        }
    }

    pub(crate) fn error(&self) -> Option<Error> {
        match self {
            ReferenceBinding::Failed { path, source } => Some(Error::MetadataRead {
                path: path.clone(),
                source: source.clone(),
            }),
            _ => None,
        }
    }
}

/// The result of binding the references of a compilation.
///
/// Holds every symbol the binding produced or reused, which keeps the whole symbol graph of
/// the compilation alive.
pub(crate) struct BoundReferences {
    pub(crate) assembly: Arc<SourceAssemblySymbol>,
    /// Parallel to the explicit references of the compilation
    pub(crate) explicit: Vec<ReferenceBinding>,
    pub(crate) implicit: Vec<(Arc<MetadataReference>, AssemblySymbol)>,
    /// The assemblies the source module references, in order
    pub(crate) referenced_assemblies: Vec<AssemblySymbol>,
    pub(crate) corlib: AssemblySymbol,
    pub(crate) missing: Vec<Arc<MissingAssemblySymbol>>,
    pub(crate) diagnostics: Diagnostics,
}

impl BoundReferences {
    pub(crate) fn implicit_symbol(
        &self,
        reference: &Arc<MetadataReference>,
    ) -> Option<&AssemblySymbol> {
        self.implicit
            .iter()
            .find(|(candidate, _)| Arc::ptr_eq(candidate, reference))
            .map(|(_, symbol)| symbol)
    }
}

/// Binds the references of one compilation, exactly once.
///
/// The first query that needs bound references runs the binding on the calling thread;
/// concurrent callers block until it finished and all of them observe the same result.
pub(crate) struct ReferenceManager {
    state: AtomicU8,
    bound: OnceLock<BoundReferences>,
}

impl ReferenceManager {
    pub(crate) fn new() -> Self {
        ReferenceManager {
            state: AtomicU8::new(ReferenceManagerState::Uninitialized as u8),
            bound: OnceLock::new(),
        }
    }

    pub(crate) fn state(&self) -> ReferenceManagerState {
        if self.bound.get().is_some() {
            return ReferenceManagerState::FullyBound;
        }
        ReferenceManagerState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub(crate) fn mark_assembly_created(&self) {
        self.state.store(
            ReferenceManagerState::AssemblySymbolCreated as u8,
            Ordering::Release,
        );
    }

    /// The bound references, binding them first if necessary
    pub(crate) fn bound(&self, compilation: &Compilation) -> &BoundReferences {
        let bound = self
            .bound
            .get_or_init(|| binding::bind(compilation, self));
        self.state
            .store(ReferenceManagerState::FullyBound as u8, Ordering::Release);
        bound
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_round_trips() {
        for state in [
            ReferenceManagerState::Uninitialized,
            ReferenceManagerState::AssemblySymbolCreated,
            ReferenceManagerState::FullyBound,
        ] {
            assert_eq!(ReferenceManagerState::from_u8(state as u8), state);
        }
        assert_eq!(ReferenceManagerState::FullyBound.to_string(), "FullyBound");
    }

    #[test]
    fn failures_keep_the_cause() {
        let binding = ReferenceBinding::failed(
            "Gone.dll",
            Error::FileError(std::io::Error::from(std::io::ErrorKind::NotFound)),
        );

        let error = binding.error().unwrap();
        assert!(error.is_not_found());
        match error {
            Error::MetadataRead { path, .. } => assert_eq!(path, PathBuf::from("Gone.dll")),
            _ => panic!("Expected MetadataRead"),
        }
    }
}
