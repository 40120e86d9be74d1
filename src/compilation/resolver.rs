use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    compilation::MetadataReference, file::is_simple_file_name,
    metadata::identity::AssemblyIdentity,
};

/// Supplies references for assemblies that referenced assemblies depend on but the compilation
/// does not reference.
///
/// Consulted during binding when [`crate::compilation::CompilationOptions`] enable missing
/// assembly resolution. Returned references are bound as implicit references of the
/// compilation, and their own dependencies are resolved the same way.
pub trait MissingAssemblyResolver: Send + Sync {
    /// Resolve `reference`, an `AssemblyRef` of the assembly `definition` that no reference of
    /// the compilation satisfies. Returns `None` if it can not be found.
    fn resolve_missing_assembly(
        &self,
        definition: &AssemblyIdentity,
        reference: &AssemblyIdentity,
    ) -> Option<Arc<MetadataReference>>;
}

impl<F> MissingAssemblyResolver for F
where
    F: Fn(&AssemblyIdentity, &AssemblyIdentity) -> Option<Arc<MetadataReference>> + Send + Sync,
{
    fn resolve_missing_assembly(
        &self,
        definition: &AssemblyIdentity,
        reference: &AssemblyIdentity,
    ) -> Option<Arc<MetadataReference>> {
        self(definition, reference)
    }
}

/// Resolves missing assemblies by file name: `<name>.dll`, then `<name>.exe`, in each search
/// path in order.
///
/// Names that are not simple file names are never resolved.
#[derive(Debug, Clone, Default)]
pub struct DirectoryResolver {
    search_paths: Vec<PathBuf>,
}

impl DirectoryResolver {
    /// A resolver without search paths
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a directory to search
    #[must_use]
    pub fn with_search_path(mut self, path: impl AsRef<Path>) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    /// The directories searched, in order
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        &self.search_paths
    }

    fn candidates<'a>(&'a self, name: &'a str) -> impl Iterator<Item = PathBuf> + 'a {
        let search_paths: &[PathBuf] = if is_simple_file_name(name) {
            self.search_paths.as_slice()
        } else {
            &[]
        };
        search_paths.iter().flat_map(move |directory| {
            [
                directory.join(format!("{name}.dll")),
                directory.join(format!("{name}.exe")),
            ]
        })
    }
}

impl MissingAssemblyResolver for DirectoryResolver {
    fn resolve_missing_assembly(
        &self,
        _definition: &AssemblyIdentity,
        reference: &AssemblyIdentity,
    ) -> Option<Arc<MetadataReference>> {
        self.candidates(&reference.name)
            .find(|path| path.is_file())
            .map(MetadataReference::file)
    }
}
