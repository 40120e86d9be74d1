//! Access to the raw bytes of metadata images.
//!
//! A [`File`] owns the bytes of one image, either memory-mapped from disk ([`physical::Physical`])
//! or held in an owned buffer ([`memory::Memory`]), and locates the ECMA-335 metadata root in it.
//! Two container formats are recognized:
//!
//! - **PE images** (`MZ`) - assemblies and netmodules produced by a compiler. The PE structure is
//!   parsed with `goblin` and the CLR runtime header (COR20) is followed to the metadata root.
//! - **Standalone metadata** (`BSJB`) - the metadata root without a PE wrapper, as written by
//!   [`crate::metadata::MetadataImageBuilder`] and used by portable PDBs.
//!
//! The [`key`] module provides [`FileKey`], the identity under which loaded files are cached.

pub mod io;
pub mod key;

mod memory;
mod physical;

use std::path::Path;

use crate::{
    metadata::root::CIL_HEADER_MAGIC,
    Error::{Empty, GoblinErr, NotSupported},
    Result,
};
use goblin::pe::PE;
use io::read_le_at;
use memory::Memory;
use ouroboros::self_referencing;
use physical::Physical;

pub use key::FileKey;

/// Source of image bytes. All implementations must be thread-safe.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Arguments
    ///
    /// * `offset` - The starting offset within the data.
    /// * `len` - The length of the slice in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the requested range is out of bounds.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data buffer.
    fn len(&self) -> usize;
}

#[self_referencing]
/// A loaded metadata image.
///
/// Holds the image bytes and, for PE images, the parsed PE headers borrowing from them.
pub struct File {
    data: Box<dyn Backend>,
    #[borrows(data)]
    #[not_covariant]
    pe: Option<PE<'this>>,
}

impl File {
    /// Load an image from disk.
    ///
    /// # Arguments
    /// * `file` - Path of the PE or standalone metadata image
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can't be read, [`crate::Error::Empty`]
    /// for empty files, and the errors of [`File::from_mem`] for unrecognized content.
    pub fn from_file(file: &Path) -> Result<File> {
        let input = Physical::new(file)?;

        Self::load(input)
    }

    /// Load an image from an owned buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for empty input, [`crate::Error::NotSupported`] if the
    /// data is neither a PE image nor standalone metadata, [`crate::Error::GoblinErr`] if the
    /// PE structure is damaged, and [`crate::Error::Malformed`] if a PE image lacks a CLR header.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        let data = Box::new(data);

        File::try_new(data, |data| {
            let data = data.as_ref().data();

            if data.starts_with(&CIL_HEADER_MAGIC.to_le_bytes()) {
                return Ok(None);
            }

            if !data.starts_with(b"MZ") {
                return Err(NotSupported);
            }

            match PE::parse(data) {
                Ok(pe) => match pe.header.optional_header {
                    Some(optional_header) => {
                        if optional_header
                            .data_directories
                            .get_clr_runtime_header()
                            .is_none()
                        {
                            Err(malformed_error!(
                                "File does not have a CLR runtime header directory"
                            ))
                        } else {
                            Ok(Some(pe))
                        }
                    }
                    None => Err(malformed_error!("File does not have an OptionalHeader")),
                },
                Err(error) => Err(GoblinErr(error)),
            }
        })
    }

    /// Returns the total size of the image in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.borrow_data().len()
    }

    /// Returns `true` if the image has no bytes (never the case for a loaded file)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw image bytes
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.borrow_data().data()
    }

    /// Returns `true` if the image is wrapped in a PE container
    #[must_use]
    pub fn is_pe(&self) -> bool {
        self.with_pe(|pe| pe.is_some())
    }

    /// Returns the bytes of the metadata root (starting at the `BSJB` signature).
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the CLR header or metadata directory of a PE image
    /// can not be mapped to file offsets, or [`crate::Error::OutOfBounds`] if they point past
    /// the end of the file.
    pub fn metadata(&self) -> Result<&[u8]> {
        let (offset, len) = self.with_pe(|pe| match pe {
            None => Ok((0, self.len())),
            Some(pe) => {
                let Some(optional_header) = &pe.header.optional_header else {
                    return Err(malformed_error!("File does not have an OptionalHeader"));
                };
                let Some(clr_dir) = optional_header.data_directories.get_clr_runtime_header()
                else {
                    return Err(malformed_error!(
                        "File does not have a CLR runtime header directory"
                    ));
                };
                let (clr_rva, clr_size) = (clr_dir.virtual_address as usize, clr_dir.size as usize);

                if clr_size < 16 {
                    return Err(malformed_error!("CLR header is too small - {}", clr_size));
                }

                let clr_offset = rva_to_offset(pe, clr_rva)?;
                let cor20 = self.borrow_data().data_slice(clr_offset, clr_size)?;

                let mut cursor = 8_usize;
                let meta_rva = read_le_at::<u32>(cor20, &mut cursor)? as usize;
                let meta_size = read_le_at::<u32>(cor20, &mut cursor)? as usize;

                Ok((rva_to_offset(pe, meta_rva)?, meta_size))
            }
        })?;

        self.borrow_data().data_slice(offset, len)
    }
}

fn rva_to_offset(pe: &PE, rva: usize) -> Result<usize> {
    let rva_u32 =
        u32::try_from(rva).map_err(|_| malformed_error!("RVA too large to fit in u32: {}", rva))?;

    for section in &pe.sections {
        let Some(section_max) = section.virtual_address.checked_add(section.virtual_size) else {
            return Err(malformed_error!(
                "Section malformed, causing integer overflow - {} + {}",
                section.virtual_address,
                section.virtual_size
            ));
        };

        if section.virtual_address <= rva_u32 && section_max > rva_u32 {
            return Ok((rva - section.virtual_address as usize) + section.pointer_to_raw_data as usize);
        }
    }

    Err(malformed_error!(
        "RVA could not be converted to offset - {}",
        rva
    ))
}

/// Returns `true` if `name` is a plain file name that stays inside the directory it is joined to.
///
/// Names from `File` and `AssemblyRef` rows must not carry separators, a root, a drive prefix or
/// `.`/`..` components.
pub(crate) fn is_simple_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', ':', '\0'])
        && matches!(
            Path::new(name).components().collect::<Vec<_>>().as_slice(),
            [std::path::Component::Normal(_)]
        )
}
