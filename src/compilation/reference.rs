use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

use crate::{
    cache::WeakList,
    compilation::Compilation,
    metadata::{AssemblyMetadata, MetadataImageKind, ModuleMetadata},
    symbols::PeAssemblySymbol,
    Result,
};

/// How a reference is consumed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataReferenceProperties {
    /// Whether the reference is an assembly or a netmodule
    pub kind: MetadataImageKind,
    /// Extern aliases of the reference; empty means the global namespace
    pub aliases: Vec<String>,
    /// Whether interop types of the assembly are embedded into the compilation
    pub embed_interop_types: bool,
}

impl MetadataReferenceProperties {
    /// Properties of a plain assembly reference
    #[must_use]
    pub fn assembly() -> Self {
        Self::default()
    }

    /// Properties of a netmodule reference
    #[must_use]
    pub fn module() -> Self {
        Self {
            kind: MetadataImageKind::Module,
            ..Self::default()
        }
    }

    /// Set the extern aliases
    #[must_use]
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Set whether interop types are embedded
    #[must_use]
    pub fn with_embed_interop_types(mut self, embed: bool) -> Self {
        self.embed_interop_types = embed;
        self
    }
}

/// Metadata parsed from an in-memory image
#[derive(Debug, Clone)]
pub enum ImageMetadata {
    /// A single-module assembly
    Assembly(Arc<AssemblyMetadata>),
    /// A netmodule
    Module(Arc<ModuleMetadata>),
}

/// An in-memory metadata image.
///
/// Images bypass the metadata cache; the symbols built over an image are tracked by the image
/// itself, so compilations sharing the reference can share them.
pub struct MetadataImage {
    metadata: ImageMetadata,
    display: String,
    symbols: Mutex<WeakList<PeAssemblySymbol>>,
}

impl MetadataImage {
    /// The parsed metadata
    #[must_use]
    pub fn metadata(&self) -> &ImageMetadata {
        &self.metadata
    }

    /// The name the image is displayed with in diagnostics
    #[must_use]
    pub fn display(&self) -> &str {
        &self.display
    }

    /// Number of symbols built over the image, dead ones included
    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.lock().weak_count()
    }

    pub(crate) fn find_symbol<F>(&self, predicate: F) -> Option<Arc<PeAssemblySymbol>>
    where
        F: FnMut(&Arc<PeAssemblySymbol>) -> bool,
    {
        let candidates = self.symbols.lock().live();
        candidates.into_iter().find(predicate)
    }

    pub(crate) fn register_symbol(&self, symbol: &Arc<PeAssemblySymbol>) {
        let mut symbols = self.symbols.lock();
        symbols.compact();
        symbols.add(symbol);
    }
}

impl fmt::Debug for MetadataImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataImage")
            .field("display", &self.display)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

/// An external reference of a [`Compilation`].
///
/// References are handed out as `Arc<MetadataReference>` and identified by that `Arc`: queries
/// such as [`Compilation::get_referenced_assembly_symbol`] take the same `Arc` the compilation
/// was created with.
#[derive(Debug)]
pub enum MetadataReference {
    /// A file on disk, loaded through the metadata cache
    File {
        /// Path of the file
        path: PathBuf,
        /// How the file is consumed
        properties: MetadataReferenceProperties,
    },
    /// An in-memory image
    Image {
        /// The parsed image
        image: MetadataImage,
        /// How the image is consumed
        properties: MetadataReferenceProperties,
    },
    /// Another compilation
    Compilation {
        /// The referenced compilation
        compilation: Arc<Compilation>,
        /// How the compilation is consumed, always as an assembly
        properties: MetadataReferenceProperties,
    },
}

impl MetadataReference {
    /// Reference the assembly at `path`
    pub fn file(path: impl AsRef<Path>) -> Arc<MetadataReference> {
        Self::file_with(path, MetadataReferenceProperties::assembly())
    }

    /// Reference the netmodule at `path`
    pub fn module_file(path: impl AsRef<Path>) -> Arc<MetadataReference> {
        Self::file_with(path, MetadataReferenceProperties::module())
    }

    /// Reference the file at `path`, consumed as `properties` describe
    pub fn file_with(
        path: impl AsRef<Path>,
        properties: MetadataReferenceProperties,
    ) -> Arc<MetadataReference> {
        Arc::new(MetadataReference::File {
            path: path.as_ref().to_path_buf(),
            properties,
        })
    }

    /// Reference an in-memory image. The image is parsed right away, as an assembly or a
    /// netmodule depending on `properties`.
    ///
    /// # Arguments
    /// * `data`        - The image: a PE file or standalone metadata
    /// * `display`     - Name used in diagnostics
    /// * `properties`  - How the image is consumed
    ///
    /// # Errors
    /// Returns an error if the image can not be parsed, and [`crate::Error::NotSupported`] for
    /// assemblies made of several modules.
    pub fn image(
        data: Vec<u8>,
        display: impl Into<String>,
        properties: MetadataReferenceProperties,
    ) -> Result<Arc<MetadataReference>> {
        let metadata = match properties.kind {
            MetadataImageKind::Assembly => {
                ImageMetadata::Assembly(Arc::new(AssemblyMetadata::from_mem(data)?))
            }
            MetadataImageKind::Module => {
                ImageMetadata::Module(Arc::new(ModuleMetadata::from_mem(data)?))
            }
        };

        Ok(Arc::new(MetadataReference::Image {
            image: MetadataImage {
                metadata,
                display: display.into(),
                symbols: Mutex::new(WeakList::new()),
            },
            properties,
        }))
    }

    /// Reference another compilation
    pub fn compilation(compilation: &Arc<Compilation>) -> Arc<MetadataReference> {
        Self::compilation_with(compilation, MetadataReferenceProperties::assembly())
    }

    /// Reference another compilation with aliases or type embedding. The kind in
    /// `properties` is ignored, compilations are always referenced as assemblies.
    pub fn compilation_with(
        compilation: &Arc<Compilation>,
        properties: MetadataReferenceProperties,
    ) -> Arc<MetadataReference> {
        Arc::new(MetadataReference::Compilation {
            compilation: compilation.clone(),
            properties: MetadataReferenceProperties {
                kind: MetadataImageKind::Assembly,
                ..properties
            },
        })
    }

    /// How the reference is consumed
    #[must_use]
    pub fn properties(&self) -> &MetadataReferenceProperties {
        match self {
            MetadataReference::File { properties, .. }
            | MetadataReference::Image { properties, .. }
            | MetadataReference::Compilation { properties, .. } => properties,
        }
    }

    /// Whether the reference is an assembly or a netmodule
    #[must_use]
    pub fn kind(&self) -> MetadataImageKind {
        match self {
            MetadataReference::Compilation { .. } => MetadataImageKind::Assembly,
            MetadataReference::Image { image, .. } => match image.metadata() {
                ImageMetadata::Assembly(_) => MetadataImageKind::Assembly,
                ImageMetadata::Module(_) => MetadataImageKind::Module,
            },
            MetadataReference::File { properties, .. } => properties.kind,
        }
    }

    /// The name the reference is displayed with in diagnostics and errors
    #[must_use]
    pub fn display(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MetadataReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataReference::File { path, .. } => write!(f, "{}", path.display()),
            MetadataReference::Image { image, .. } => write!(f, "{}", image.display()),
            MetadataReference::Compilation { compilation, .. } => {
                write!(f, "{}", compilation.name())
            }
        }
    }
}
