//! Writing standalone metadata images.
//!
//! [`MetadataImageBuilder`] produces the smallest image the reader accepts: a metadata root with
//! `#~`, `#Strings`, `#GUID` and `#Blob` streams, and the `Module`, `Assembly`, `AssemblyRef`
//! and `File` tables. It is enough to describe assemblies, netmodules and their references, which
//! is everything reference binding looks at.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotbind::metadata::{identity::AssemblyIdentity, MetadataImageBuilder};
//!
//! MetadataImageBuilder::new()
//!     .module("Lib.dll")
//!     .assembly(AssemblyIdentity::parse("Lib, Version=1.0.0.0")?)
//!     .assembly_ref(AssemblyIdentity::parse("mscorlib, Version=4.0.0.0")?)
//!     .write_to("Lib.dll")?;
//! # Ok::<(), dotbind::Error>(())
//! ```

use std::{collections::HashMap, path::Path};

use sha1::{Digest, Sha1};

use crate::{
    file::io::{write_compressed_uint, write_le_at},
    metadata::{
        identity::{AssemblyIdentity, Identity},
        module::FileEntry,
        root::CIL_HEADER_MAGIC,
        tables::{
            AssemblyFlags, AssemblyHashAlgorithm, AssemblyRaw, AssemblyRefRaw, FileAttributes,
            FileRaw, ModuleRaw, RowWritable, TableId, TableInfo,
        },
    },
    Result,
};

const RUNTIME_VERSION: &str = "v4.0.30319";

/// Builder for standalone (`BSJB`) metadata images
#[derive(Debug, Clone, Default)]
pub struct MetadataImageBuilder {
    module_name: Option<String>,
    mvid: Option<uguid::Guid>,
    assembly: Option<AssemblyIdentity>,
    assembly_refs: Vec<AssemblyIdentity>,
    files: Vec<FileEntry>,
}

#[derive(Default)]
struct Heaps {
    strings: Vec<u8>,
    string_index: HashMap<String, u32>,
    blob: Vec<u8>,
    guids: Vec<u8>,
}

impl Heaps {
    fn new() -> Self {
        Heaps {
            strings: vec![0],
            blob: vec![0],
            ..Default::default()
        }
    }

    fn string(&mut self, value: &str) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }
        if let Some(index) = self.string_index.get(value) {
            return Ok(*index);
        }

        let index = heap_index(self.strings.len())?;
        self.strings.extend_from_slice(value.as_bytes());
        self.strings.push(0);
        self.string_index.insert(value.to_string(), index);

        Ok(index)
    }

    fn blob(&mut self, value: &[u8]) -> Result<u32> {
        if value.is_empty() {
            return Ok(0);
        }

        let index = heap_index(self.blob.len())?;
        write_compressed_uint(heap_index(value.len())?, &mut self.blob)?;
        self.blob.extend_from_slice(value);

        Ok(index)
    }

    fn guid(&mut self, value: uguid::Guid) -> Result<u32> {
        self.guids.extend_from_slice(&value.to_bytes());
        heap_index(self.guids.len() / 16)
    }

    fn heap_sizes(&self) -> u8 {
        let mut heap_sizes = 0;
        if self.strings.len() > usize::from(u16::MAX) {
            heap_sizes |= 1;
        }
        if self.guids.len() / 16 > usize::from(u16::MAX) {
            heap_sizes |= 2;
        }
        if self.blob.len() > usize::from(u16::MAX) {
            heap_sizes |= 4;
        }
        heap_sizes
    }
}

fn heap_index(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| malformed_error!("Heap exceeds 4GB - {}", value))
}

fn align4(len: usize) -> usize {
    (len + 3) & !3
}

impl MetadataImageBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the module name (required)
    #[must_use]
    pub fn module(mut self, name: impl Into<String>) -> Self {
        self.module_name = Some(name.into());
        self
    }

    /// Set the module version id; derived from the module name if not set
    #[must_use]
    pub fn mvid(mut self, mvid: uguid::Guid) -> Self {
        self.mvid = Some(mvid);
        self
    }

    /// Make the image an assembly manifest with `identity`
    #[must_use]
    pub fn assembly(mut self, identity: AssemblyIdentity) -> Self {
        self.assembly = Some(identity);
        self
    }

    /// Append a row to the `AssemblyRef` table
    #[must_use]
    pub fn assembly_ref(mut self, identity: AssemblyIdentity) -> Self {
        self.assembly_refs.push(identity);
        self
    }

    /// Append a row to the `File` table
    #[must_use]
    pub fn file(mut self, name: impl Into<String>, contains_metadata: bool) -> Self {
        self.files.push(FileEntry {
            name: name.into(),
            contains_metadata,
        });
        self
    }

    /// Produce the image bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if no module name was set or a heap overflows
    pub fn build(&self) -> Result<Vec<u8>> {
        let Some(module_name) = &self.module_name else {
            return Err(malformed_error!("Module name must be set"));
        };

        let mut heaps = Heaps::new();

        let mvid = self.mvid.unwrap_or_else(|| derive_mvid(module_name));
        let module = ModuleRaw {
            rid: 1,
            generation: 0,
            name: heaps.string(module_name)?,
            mvid: heaps.guid(mvid)?,
            encid: 0,
            encbaseid: 0,
        };

        let assembly = match &self.assembly {
            Some(identity) => {
                let public_key = match &identity.strong_name {
                    Some(Identity::PubKey(key)) => heaps.blob(key)?,
                    // the manifest can only carry a full key
                    _ => 0,
                };

                Some(AssemblyRaw {
                    rid: 1,
                    hash_alg_id: AssemblyHashAlgorithm::SHA1,
                    major_version: identity.version.major,
                    minor_version: identity.version.minor,
                    build_number: identity.version.build,
                    revision_number: identity.version.revision,
                    flags: if public_key == 0 {
                        0
                    } else {
                        AssemblyFlags::PUBLIC_KEY.bits()
                    },
                    public_key,
                    name: heaps.string(&identity.name)?,
                    culture: heaps.string(identity.culture.as_deref().unwrap_or_default())?,
                })
            }
            None => None,
        };

        let mut assembly_refs = Vec::with_capacity(self.assembly_refs.len());
        for (index, identity) in self.assembly_refs.iter().enumerate() {
            let (flags, public_key_or_token) = match &identity.strong_name {
                Some(Identity::PubKey(key)) => (AssemblyFlags::PUBLIC_KEY.bits(), heaps.blob(key)?),
                Some(Identity::Token(token)) => (0, heaps.blob(&token.to_le_bytes())?),
                None => (0, 0),
            };

            assembly_refs.push(AssemblyRefRaw {
                rid: heap_index(index + 1)?,
                major_version: identity.version.major,
                minor_version: identity.version.minor,
                build_number: identity.version.build,
                revision_number: identity.version.revision,
                flags,
                public_key_or_token,
                name: heaps.string(&identity.name)?,
                culture: heaps.string(identity.culture.as_deref().unwrap_or_default())?,
                hash_value: 0,
            });
        }

        let mut files = Vec::with_capacity(self.files.len());
        for (index, entry) in self.files.iter().enumerate() {
            files.push(FileRaw {
                rid: heap_index(index + 1)?,
                flags: if entry.contains_metadata {
                    FileAttributes::CONTAINS_META_DATA
                } else {
                    FileAttributes::CONTAINS_NO_META_DATA
                },
                name: heaps.string(&entry.name)?,
                hash_value: 0,
            });
        }

        let mut counts = vec![(TableId::Module, 1)];
        if assembly.is_some() {
            counts.push((TableId::Assembly, 1));
        }
        if !assembly_refs.is_empty() {
            counts.push((TableId::AssemblyRef, heap_index(assembly_refs.len())?));
        }
        if !files.is_empty() {
            counts.push((TableId::File, heap_index(files.len())?));
        }

        let heap_sizes = heaps.heap_sizes();
        let info = TableInfo::new(&counts, heap_sizes);

        let header_len = 24 + counts.len() * 4;
        let rows_len: usize = counts
            .iter()
            .map(|(table, rows)| *rows as usize * info.row_size(*table) as usize)
            .sum();

        let mut tables = vec![0_u8; align4(header_len + rows_len)];
        let mut offset = 0;
        write_le_at::<u32>(&mut tables, &mut offset, 0)?;
        write_le_at::<u8>(&mut tables, &mut offset, 2)?;
        write_le_at::<u8>(&mut tables, &mut offset, 0)?;
        write_le_at::<u8>(&mut tables, &mut offset, heap_sizes)?;
        write_le_at::<u8>(&mut tables, &mut offset, 1)?;
        let valid = counts
            .iter()
            .fold(0_u64, |mask, (table, _)| mask | (1 << *table as u8));
        write_le_at::<u64>(&mut tables, &mut offset, valid)?;
        write_le_at::<u64>(&mut tables, &mut offset, 0)?;
        for (_, rows) in &counts {
            write_le_at::<u32>(&mut tables, &mut offset, *rows)?;
        }

        module.row_write(&mut tables, &mut offset, &info)?;
        if let Some(assembly) = &assembly {
            assembly.row_write(&mut tables, &mut offset, &info)?;
        }
        for row in &assembly_refs {
            row.row_write(&mut tables, &mut offset, &info)?;
        }
        for row in &files {
            row.row_write(&mut tables, &mut offset, &info)?;
        }

        let mut strings = heaps.strings;
        strings.resize(align4(strings.len()), 0);
        let mut blob = heaps.blob;
        blob.resize(align4(blob.len()), 0);

        write_root(&[
            ("#~", tables.as_slice()),
            ("#Strings", strings.as_slice()),
            ("#GUID", heaps.guids.as_slice()),
            ("#Blob", blob.as_slice()),
        ])
    }

    /// Write the image to `path`
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be written, or any error of
    /// [`MetadataImageBuilder::build`]
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.build()?)?;
        Ok(())
    }
}

fn derive_mvid(module_name: &str) -> uguid::Guid {
    let digest = Sha1::digest(module_name.as_bytes());

    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&digest[..16]);

    uguid::Guid::from_bytes(bytes)
}

fn write_root(streams: &[(&str, &[u8])]) -> Result<Vec<u8>> {
    let version_len = align4(RUNTIME_VERSION.len() + 1);
    let headers_len: usize = streams
        .iter()
        .map(|(name, _)| 8 + align4(name.len() + 1))
        .sum();
    let root_len = 16 + version_len + 4 + headers_len;
    let streams_len: usize = streams.iter().map(|(_, data)| data.len()).sum();

    let mut image = vec![0_u8; root_len + streams_len];
    let mut offset = 0;
    write_le_at::<u32>(&mut image, &mut offset, CIL_HEADER_MAGIC)?;
    write_le_at::<u16>(&mut image, &mut offset, 1)?;
    write_le_at::<u16>(&mut image, &mut offset, 1)?;
    write_le_at::<u32>(&mut image, &mut offset, 0)?;
    write_le_at::<u32>(&mut image, &mut offset, heap_index(version_len)?)?;
    image[offset..offset + RUNTIME_VERSION.len()].copy_from_slice(RUNTIME_VERSION.as_bytes());
    offset += version_len;
    write_le_at::<u16>(&mut image, &mut offset, 0)?;
    write_le_at::<u16>(&mut image, &mut offset, streams.len() as u16)?;

    let mut stream_offset = root_len;
    for (name, data) in streams {
        write_le_at::<u32>(&mut image, &mut offset, heap_index(stream_offset)?)?;
        write_le_at::<u32>(&mut image, &mut offset, heap_index(data.len())?)?;
        image[offset..offset + name.len()].copy_from_slice(name.as_bytes());
        offset += align4(name.len() + 1);

        image[stream_offset..stream_offset + data.len()].copy_from_slice(data);
        stream_offset += data.len();
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{root::Root, streams::TablesHeader};

    #[test]
    fn root_layout() {
        let image = MetadataImageBuilder::new().module("A").build().unwrap();

        let root = Root::read(&image).unwrap();
        assert_eq!(root.version, RUNTIME_VERSION);
        assert_eq!(root.stream_headers.len(), 4);
        for stream in &root.stream_headers {
            assert_eq!(stream.offset % 4, 0);
        }

        let tables = TablesHeader::from(root.stream_data(&image, "#~").unwrap().unwrap()).unwrap();
        assert_eq!(tables.table_count(), 1);
        assert_eq!(tables.row_count(TableId::Module), 1);
    }

    #[test]
    fn tables_present() {
        let image = MetadataImageBuilder::new()
            .module("A.dll")
            .assembly(AssemblyIdentity::parse("A").unwrap())
            .assembly_ref(AssemblyIdentity::parse("B").unwrap())
            .assembly_ref(AssemblyIdentity::parse("C").unwrap())
            .file("A2.netmodule", true)
            .build()
            .unwrap();

        let root = Root::read(&image).unwrap();
        let tables = TablesHeader::from(root.stream_data(&image, "#~").unwrap().unwrap()).unwrap();

        assert_eq!(tables.table_count(), 4);
        assert_eq!(tables.row_count(TableId::Assembly), 1);
        assert_eq!(tables.row_count(TableId::AssemblyRef), 2);
        assert_eq!(tables.row_count(TableId::File), 1);
    }

    #[test]
    fn strings_are_shared() {
        let mut heaps = Heaps::new();

        let first = heaps.string("System").unwrap();
        assert_eq!(first, 1);
        assert_eq!(heaps.string("System").unwrap(), first);
        assert_eq!(heaps.string("").unwrap(), 0);
        assert_eq!(heaps.string("Core").unwrap(), 8);
    }

    #[test]
    fn mvid() {
        let derived = MetadataImageBuilder::new().module("A").build().unwrap();
        assert_eq!(derived, MetadataImageBuilder::new().module("A").build().unwrap());

        let explicit = MetadataImageBuilder::new()
            .module("A")
            .mvid(uguid::Guid::ZERO)
            .build()
            .unwrap();
        assert_ne!(derived, explicit);
    }

    #[test]
    fn module_required() {
        assert!(MetadataImageBuilder::new().build().is_err());
    }
}
