//! Metadata of a (possibly multi-module) assembly.

use std::{path::Path, sync::Arc};

use crate::{
    file::is_simple_file_name,
    metadata::{identity::AssemblyIdentity, module::ModuleMetadata},
    Error, Result,
};

/// An assembly: its manifest module followed by every additional module of the assembly.
///
/// Additional modules are the `File` table entries of the manifest that contain metadata; they
/// are loaded from the directory of the manifest, in `File` table order.
#[derive(Debug)]
pub struct AssemblyMetadata {
    identity: AssemblyIdentity,
    modules: Vec<Arc<ModuleMetadata>>,
}

impl AssemblyMetadata {
    /// Load the assembly whose manifest module is the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the image has no `Assembly` table or a `File`
    /// entry is not a simple file name, and [`crate::Error::MetadataRead`] if an additional
    /// module can not be loaded
    pub fn from_file(path: &Path) -> Result<AssemblyMetadata> {
        let manifest = ModuleMetadata::from_file(path)?;
        let directory = path.parent().unwrap_or_else(|| Path::new(""));

        let mut modules = Vec::new();
        for entry in manifest.files().iter().filter(|entry| entry.contains_metadata) {
            if !is_simple_file_name(&entry.name) {
                return Err(malformed_error!(
                    "File table entry '{}' of '{}' is not a simple file name",
                    entry.name,
                    manifest.name()
                ));
            }

            let module_path = directory.join(&entry.name);
            let module = ModuleMetadata::from_file(&module_path)
                .map_err(|error| Error::metadata_read(&module_path, error))?;
            modules.push(Arc::new(module));
        }

        Self::new(manifest, modules)
    }

    /// Load a single-module assembly from an in-memory image.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the image has no `Assembly` table, and
    /// [`crate::Error::NotSupported`] if the manifest lists additional modules
    pub fn from_mem(data: Vec<u8>) -> Result<AssemblyMetadata> {
        let manifest = ModuleMetadata::from_mem(data)?;
        if manifest.files().iter().any(|entry| entry.contains_metadata) {
            return Err(Error::NotSupported);
        }

        Self::new(manifest, Vec::new())
    }

    /// Assemble an assembly from an already loaded manifest and its additional modules.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `manifest` has no `Assembly` table
    pub fn new(
        manifest: ModuleMetadata,
        additional_modules: Vec<Arc<ModuleMetadata>>,
    ) -> Result<AssemblyMetadata> {
        let Some(identity) = manifest.assembly_identity().cloned() else {
            return Err(malformed_error!(
                "Module '{}' is not an assembly manifest",
                manifest.name()
            ));
        };

        let mut modules = Vec::with_capacity(additional_modules.len() + 1);
        modules.push(Arc::new(manifest));
        modules.extend(additional_modules);

        Ok(AssemblyMetadata { identity, modules })
    }

    /// The identity from the `Assembly` table of the manifest
    #[must_use]
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.identity
    }

    /// The manifest module followed by the additional modules
    #[must_use]
    pub fn modules(&self) -> &[Arc<ModuleMetadata>] {
        &self.modules
    }

    /// The manifest module
    #[must_use]
    pub fn manifest_module(&self) -> &Arc<ModuleMetadata> {
        &self.modules[0]
    }

    /// The `AssemblyRef` rows of all modules, concatenated in module order
    #[must_use]
    pub fn assembly_references(&self) -> Vec<AssemblyIdentity> {
        self.modules
            .iter()
            .flat_map(|module| module.assembly_references().iter().cloned())
            .collect()
    }

    /// Number of `AssemblyRef` rows per module, in module order
    #[must_use]
    pub fn module_reference_counts(&self) -> Vec<usize> {
        self.modules
            .iter()
            .map(|module| module.assembly_references().len())
            .collect()
    }
}
