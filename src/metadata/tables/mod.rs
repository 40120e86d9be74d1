//! Metadata tables of the `#~` stream.
//!
//! The tables relevant to reference binding are decoded into typed rows:
//!
//! - [`ModuleRaw`] - the single row describing the module itself
//! - [`AssemblyRaw`] - the assembly manifest (absent in netmodules)
//! - [`AssemblyRefRaw`] - assemblies the module references
//! - [`FileRaw`] - the other files of a multi-module assembly
//!
//! All other tables are only sized (see [`schema`]), which is required to locate the decoded ones.
//! Rows are read lazily through [`MetadataTable`], which knows the row size from the
//! [`TableInfo`] of the image, and written back with [`RowWritable`] by
//! [`crate::metadata::MetadataImageBuilder`].

mod codedindex;
mod rows;
pub mod schema;
mod tableinfo;

use std::marker::PhantomData;

use strum::{EnumCount, EnumIter, IntoEnumIterator};

use crate::{Error::OutOfBounds, Result};

pub use codedindex::CodedIndexType;
pub use rows::{
    AssemblyFlags, AssemblyHashAlgorithm, AssemblyRaw, AssemblyRefRaw, FileAttributes, FileRaw,
    ModuleRaw,
};
pub use tableinfo::{TableInfo, TableInfoRef, TableRowInfo};

/// Identifiers of the metadata tables; the discriminant is the table's bit in the valid mask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, EnumCount)]
#[repr(u8)]
#[allow(missing_docs)]
pub enum TableId {
    Module = 0x00,
    TypeRef = 0x01,
    TypeDef = 0x02,
    FieldPtr = 0x03,
    Field = 0x04,
    MethodPtr = 0x05,
    MethodDef = 0x06,
    ParamPtr = 0x07,
    Param = 0x08,
    InterfaceImpl = 0x09,
    MemberRef = 0x0A,
    Constant = 0x0B,
    CustomAttribute = 0x0C,
    FieldMarshal = 0x0D,
    DeclSecurity = 0x0E,
    ClassLayout = 0x0F,
    FieldLayout = 0x10,
    StandAloneSig = 0x11,
    EventMap = 0x12,
    EventPtr = 0x13,
    Event = 0x14,
    PropertyMap = 0x15,
    PropertyPtr = 0x16,
    Property = 0x17,
    MethodSemantics = 0x18,
    MethodImpl = 0x19,
    ModuleRef = 0x1A,
    TypeSpec = 0x1B,
    ImplMap = 0x1C,
    FieldRVA = 0x1D,
    EncLog = 0x1E,
    EncMap = 0x1F,
    Assembly = 0x20,
    AssemblyProcessor = 0x21,
    AssemblyOS = 0x22,
    AssemblyRef = 0x23,
    AssemblyRefProcessor = 0x24,
    AssemblyRefOS = 0x25,
    File = 0x26,
    ExportedType = 0x27,
    ManifestResource = 0x28,
    NestedClass = 0x29,
    GenericParam = 0x2A,
    MethodSpec = 0x2B,
    GenericParamConstraint = 0x2C,
    Document = 0x30,
    MethodDebugInformation = 0x31,
    LocalScope = 0x32,
    LocalVariable = 0x33,
    LocalConstant = 0x34,
    ImportScope = 0x35,
    StateMachineMethod = 0x36,
    CustomDebugInformation = 0x37,
}

impl TableId {
    /// Look up the table stored at `bit` of the valid mask
    #[must_use]
    pub fn from_bit(bit: u8) -> Option<TableId> {
        TableId::iter().find(|id| *id as u8 == bit)
    }
}

/// A row type that can be decoded from table data.
pub trait RowReadable: Sized {
    /// The table this row type belongs to
    const TABLE: TableId;

    /// Decode one row at `offset`, advancing `offset` past it
    ///
    /// # Arguments
    /// * `data`    - The table data
    /// * `offset`  - The position of the row, updated on success
    /// * `rid`     - The 1-based row id
    /// * `sizes`   - The index widths of the image
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row is truncated
    fn row_read(data: &[u8], offset: &mut usize, rid: u32, sizes: &TableInfo) -> Result<Self>;
}

/// A row type that can be encoded into table data.
pub trait RowWritable {
    /// Encode this row at `offset`, advancing `offset` past it
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is too short, or
    /// [`crate::Error::Malformed`] if a heap index does not fit the width `sizes` selects
    fn row_write(&self, data: &mut [u8], offset: &mut usize, sizes: &TableInfo) -> Result<()>;
}

/// Typed view over the rows of one table
pub struct MetadataTable<'a, T> {
    data: &'a [u8],
    row_count: u32,
    row_size: u32,
    sizes: TableInfoRef,
    _phantom: PhantomData<T>,
}

impl<'a, T: RowReadable> MetadataTable<'a, T> {
    /// Create a view over `row_count` rows stored in `data`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `data` is shorter than the rows it must hold
    pub fn new(data: &'a [u8], row_count: u32, sizes: TableInfoRef) -> Result<Self> {
        let row_size = sizes.row_size(T::TABLE);
        if u64::from(row_count) * u64::from(row_size) > data.len() as u64 {
            return Err(OutOfBounds);
        }

        Ok(MetadataTable {
            data,
            row_count,
            row_size,
            sizes,
            _phantom: PhantomData,
        })
    }

    /// Size of one row in bytes
    #[must_use]
    pub fn row_size(&self) -> u32 {
        self.row_size
    }

    /// Number of rows
    #[must_use]
    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Read the row with the 1-based id `rid`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `rid` is 0 or larger than the row count
    pub fn get(&self, rid: u32) -> Result<T> {
        if rid == 0 || self.row_count < rid {
            return Err(OutOfBounds);
        }

        T::row_read(
            self.data,
            &mut ((rid as usize - 1) * self.row_size as usize),
            rid,
            &self.sizes,
        )
    }

    /// Iterate all rows in storage order
    #[must_use]
    pub fn iter(&self) -> TableIterator<'_, 'a, T> {
        TableIterator {
            table: self,
            current_row: 0,
            current_offset: 0,
        }
    }
}

/// Iterator over the rows of a [`MetadataTable`]
pub struct TableIterator<'t, 'a, T> {
    table: &'t MetadataTable<'a, T>,
    current_row: u32,
    current_offset: usize,
}

impl<T: RowReadable> Iterator for TableIterator<'_, '_, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.table.row_count {
            return None;
        }

        self.current_row += 1;
        Some(T::row_read(
            self.table.data,
            &mut self.current_offset,
            self.current_row,
            &self.table.sizes,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_ids() {
        assert_eq!(TableId::COUNT, 53);
        assert_eq!(TableId::from_bit(0x23), Some(TableId::AssemblyRef));
        assert_eq!(TableId::from_bit(0x2D), None);
        assert_eq!(TableId::from_bit(0x37), Some(TableId::CustomDebugInformation));
    }
}
