//! Metadata of a single module.

use std::path::Path;

use crate::{
    file::File,
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion, Identity},
        root::Root,
        streams::{Blob, Guid, Strings, TablesHeader},
        tables::{AssemblyFlags, AssemblyRaw, AssemblyRefRaw, FileRaw, ModuleRaw},
    },
    Result,
};

/// An entry of the `File` table of an assembly manifest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File name, relative to the manifest module
    pub name: String,
    /// Whether the file is a module with metadata (as opposed to a resource)
    pub contains_metadata: bool,
}

/// The parts of a module's metadata that reference binding needs.
///
/// Parsed once from a PE image or standalone metadata image. The image itself is not retained,
/// a `ModuleMetadata` is plain owned data and can be shared freely between threads.
#[derive(Debug)]
pub struct ModuleMetadata {
    name: String,
    mvid: uguid::Guid,
    runtime_version: String,
    assembly: Option<AssemblyIdentity>,
    assembly_references: Vec<AssemblyIdentity>,
    files: Vec<FileEntry>,
    image_size: usize,
}

impl ModuleMetadata {
    /// Load the module metadata of the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be read, and
    /// [`crate::Error::Malformed`] or [`crate::Error::NotSupported`] for invalid images
    pub fn from_file(path: &Path) -> Result<ModuleMetadata> {
        let file = File::from_file(path)?;
        Self::load(&file)
    }

    /// Load the module metadata of an in-memory image.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`], [`crate::Error::Empty`] or
    /// [`crate::Error::NotSupported`] for invalid images
    pub fn from_mem(data: Vec<u8>) -> Result<ModuleMetadata> {
        let file = File::from_mem(data)?;
        Self::load(&file)
    }

    fn load(file: &File) -> Result<ModuleMetadata> {
        let data = file.metadata()?;
        let root = Root::read(data)?;

        let tables_data = match root.stream_data(data, "#~")? {
            Some(tables) => tables,
            None => match root.stream_data(data, "#-")? {
                Some(tables) => tables,
                None => return Err(malformed_error!("Metadata has no tables stream")),
            },
        };
        let tables = TablesHeader::from(tables_data)?;

        let Some(strings_data) = root.stream_data(data, "#Strings")? else {
            return Err(malformed_error!("Metadata has no #Strings heap"));
        };
        let strings = Strings::from(strings_data)?;

        let blob = match root.stream_data(data, "#Blob")? {
            Some(blob) => Some(Blob::from(blob)?),
            None => None,
        };
        let guids = match root.stream_data(data, "#GUID")? {
            Some(guids) => Some(Guid::from(guids)?),
            None => None,
        };

        let Some(module_table) = tables.table::<ModuleRaw>() else {
            return Err(malformed_error!("Metadata has no Module table"));
        };
        let module = module_table.get(1)?;

        let mvid = match (module.mvid, &guids) {
            (0, _) => uguid::Guid::ZERO,
            (index, Some(guids)) => guids.get(index as usize)?,
            (index, None) => {
                return Err(malformed_error!(
                    "Module references GUID {} but there is no #GUID heap",
                    index
                ))
            }
        };

        let assembly = match tables.table::<AssemblyRaw>() {
            Some(table) if table.row_count() > 0 => {
                Some(read_assembly(&table.get(1)?, &strings, blob.as_ref())?)
            }
            _ => None,
        };

        let mut assembly_references = Vec::new();
        if let Some(table) = tables.table::<AssemblyRefRaw>() {
            for row in table.iter() {
                assembly_references.push(read_assembly_ref(&row?, &strings, blob.as_ref())?);
            }
        }

        let mut files = Vec::new();
        if let Some(table) = tables.table::<FileRaw>() {
            for row in table.iter() {
                let row = row?;
                files.push(FileEntry {
                    name: strings.get(row.name as usize)?.to_string(),
                    contains_metadata: row.contains_metadata(),
                });
            }
        }

        Ok(ModuleMetadata {
            name: strings.get(module.name as usize)?.to_string(),
            mvid,
            runtime_version: root.version,
            assembly,
            assembly_references,
            files,
            image_size: file.len(),
        })
    }

    /// Name of the module, as stored in the `Module` table
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Module version id
    #[must_use]
    pub fn mvid(&self) -> uguid::Guid {
        self.mvid
    }

    /// Runtime version named in the metadata root
    #[must_use]
    pub fn runtime_version(&self) -> &str {
        &self.runtime_version
    }

    /// The assembly defined by this module, `None` for netmodules
    #[must_use]
    pub fn assembly_identity(&self) -> Option<&AssemblyIdentity> {
        self.assembly.as_ref()
    }

    /// Whether this module carries an assembly manifest
    #[must_use]
    pub fn is_manifest_module(&self) -> bool {
        self.assembly.is_some()
    }

    /// The rows of the `AssemblyRef` table, in table order
    #[must_use]
    pub fn assembly_references(&self) -> &[AssemblyIdentity] {
        &self.assembly_references
    }

    /// The rows of the `File` table, in table order
    #[must_use]
    pub fn files(&self) -> &[FileEntry] {
        &self.files
    }

    /// Size of the image this metadata was read from
    #[must_use]
    pub fn image_size(&self) -> usize {
        self.image_size
    }
}

fn blob_at<'a>(blob: Option<&Blob<'a>>, index: u32) -> Result<&'a [u8]> {
    if index == 0 {
        return Ok(&[]);
    }

    match blob {
        Some(blob) => blob.get(index as usize),
        None => Err(malformed_error!(
            "Row references blob {} but there is no #Blob heap",
            index
        )),
    }
}

fn culture_at(strings: &Strings, index: u32) -> Result<Option<String>> {
    if index == 0 {
        return Ok(None);
    }

    Ok(Some(strings.get(index as usize)?.to_string()))
}

fn read_assembly(
    row: &AssemblyRaw,
    strings: &Strings,
    blob: Option<&Blob>,
) -> Result<AssemblyIdentity> {
    let public_key = blob_at(blob, row.public_key)?;

    Ok(AssemblyIdentity::new(
        strings.get(row.name as usize)?,
        AssemblyVersion::new(
            row.major_version,
            row.minor_version,
            row.build_number,
            row.revision_number,
        ),
        culture_at(strings, row.culture)?,
        (!public_key.is_empty()).then(|| Identity::PubKey(public_key.to_vec())),
        None,
    ))
}

fn read_assembly_ref(
    row: &AssemblyRefRaw,
    strings: &Strings,
    blob: Option<&Blob>,
) -> Result<AssemblyIdentity> {
    let key_or_token = blob_at(blob, row.public_key_or_token)?;
    let strong_name = if key_or_token.is_empty() {
        None
    } else {
        let is_pub = AssemblyFlags::from_bits_truncate(row.flags).contains(AssemblyFlags::PUBLIC_KEY);
        Some(Identity::from(key_or_token, is_pub)?)
    };

    Ok(AssemblyIdentity::new(
        strings.get(row.name as usize)?,
        AssemblyVersion::new(
            row.major_version,
            row.minor_version,
            row.build_number,
            row.revision_number,
        ),
        culture_at(strings, row.culture)?,
        strong_name,
        None,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataImageBuilder;

    #[test]
    fn assembly_image() {
        let mscorlib = AssemblyIdentity::parse(
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();
        let image = MetadataImageBuilder::new()
            .module("Lib.dll")
            .assembly(AssemblyIdentity::parse("Lib, Version=1.2.3.4").unwrap())
            .assembly_ref(mscorlib.clone())
            .assembly_ref(AssemblyIdentity::parse("Other, Version=2.0.0.0, Culture=de").unwrap())
            .file("Lib2.netmodule", true)
            .file("readme.txt", false)
            .build()
            .unwrap();

        let module = ModuleMetadata::from_mem(image).unwrap();

        assert_eq!(module.name(), "Lib.dll");
        assert_ne!(module.mvid(), uguid::Guid::ZERO);
        assert!(module.is_manifest_module());
        assert_eq!(
            module.assembly_identity().unwrap().version,
            AssemblyVersion::new(1, 2, 3, 4)
        );

        let references = module.assembly_references();
        assert_eq!(references.len(), 2);
        assert_eq!(references[0].display_name(), mscorlib.display_name());
        assert_eq!(references[1].culture.as_deref(), Some("de"));
        assert!(references[1].strong_name.is_none());

        assert_eq!(
            module.files(),
            &[
                FileEntry {
                    name: "Lib2.netmodule".to_string(),
                    contains_metadata: true
                },
                FileEntry {
                    name: "readme.txt".to_string(),
                    contains_metadata: false
                }
            ]
        );
    }

    #[test]
    fn netmodule_image() {
        let image = MetadataImageBuilder::new()
            .module("Part.netmodule")
            .build()
            .unwrap();

        let module = ModuleMetadata::from_mem(image).unwrap();

        assert_eq!(module.name(), "Part.netmodule");
        assert!(!module.is_manifest_module());
        assert!(module.assembly_references().is_empty());
        assert!(module.files().is_empty());
    }

    #[test]
    fn strong_named_assembly() {
        let key = vec![0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0];
        let identity = AssemblyIdentity::new(
            "mscorlib",
            AssemblyVersion::new(4, 0, 0, 0),
            None,
            Some(Identity::PubKey(key.clone())),
            None,
        );
        let image = MetadataImageBuilder::new()
            .module("mscorlib.dll")
            .assembly(identity)
            .build()
            .unwrap();

        let module = ModuleMetadata::from_mem(image).unwrap();
        let identity = module.assembly_identity().unwrap();

        assert_eq!(identity.strong_name, Some(Identity::PubKey(key)));
        assert_eq!(identity.public_key_token(), Some(u64::from_le_bytes([0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89])));
    }

    #[test]
    fn invalid_images() {
        assert!(ModuleMetadata::from_mem(Vec::new()).is_err());
        assert!(ModuleMetadata::from_mem(vec![0x7F, b'E', b'L', b'F', 0, 0, 0, 0]).is_err());

        let mut image = MetadataImageBuilder::new().module("A").build().unwrap();
        image.truncate(image.len() / 2);
        assert!(ModuleMetadata::from_mem(image).is_err());
    }
}
