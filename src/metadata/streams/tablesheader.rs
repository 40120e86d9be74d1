use std::sync::Arc;
use strum::IntoEnumIterator;

use crate::{
    file::io::read_le,
    metadata::tables::{MetadataTable, RowReadable, TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

/// The header of the `#~` stream and the location of every present table, §II.24.2.6
pub struct TablesHeader<'a> {
    /// Major version of the table schema (2)
    pub major_version: u8,
    /// Minor version of the table schema (0)
    pub minor_version: u8,
    /// Heap size flags (bit 0: `#Strings`, bit 1: `#GUID`, bit 2: `#Blob` use 4 byte indexes)
    pub heap_sizes: u8,
    /// Bit mask of present tables
    pub valid: u64,
    /// Bit mask of sorted tables
    pub sorted: u64,
    /// Row counts and index widths
    pub info: TableInfoRef,
    data: &'a [u8],
    table_offsets: Vec<Option<usize>>,
}

impl<'a> TablesHeader<'a> {
    /// Parse the `#~` stream
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream is shorter than its tables, or
    /// [`crate::Error::Malformed`] if it contains unknown tables
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let heap_sizes = read_le::<u8>(&data[6..])?;
        let valid = read_le::<u64>(&data[8..])?;
        let info = Arc::new(TableInfo::read(data, valid, heap_sizes)?);

        let mut table_offsets = vec![None; 64];
        let mut current_offset = 24 + valid.count_ones() as usize * 4;
        for table_id in TableId::iter() {
            if valid & (1 << table_id as u8) == 0 {
                continue;
            }

            let table_len =
                u64::from(info.get(table_id).rows) * u64::from(info.row_size(table_id));
            let Ok(table_len) = usize::try_from(table_len) else {
                return Err(OutOfBounds);
            };
            let Some(table_end) = current_offset.checked_add(table_len) else {
                return Err(OutOfBounds);
            };
            if table_end > data.len() {
                return Err(OutOfBounds);
            }

            table_offsets[table_id as usize] = Some(current_offset);
            current_offset = table_end;
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            heap_sizes,
            valid,
            sorted: read_le::<u64>(&data[16..])?,
            info,
            data,
            table_offsets,
        })
    }

    /// Number of present tables
    #[must_use]
    pub fn table_count(&self) -> u32 {
        self.valid.count_ones()
    }

    /// Whether `table_id` is present
    #[must_use]
    pub fn has_table(&self, table_id: TableId) -> bool {
        self.table_offsets[table_id as usize].is_some()
    }

    /// Row count of `table_id`, 0 if absent
    #[must_use]
    pub fn row_count(&self, table_id: TableId) -> u32 {
        self.info.get(table_id).rows
    }

    /// Typed view of the table `T` belongs to, `None` if absent
    #[must_use]
    pub fn table<T: RowReadable>(&self) -> Option<MetadataTable<'a, T>> {
        let offset = self.table_offsets[T::TABLE as usize]?;

        MetadataTable::new(
            &self.data[offset..],
            self.info.get(T::TABLE).rows,
            self.info.clone(),
        )
        .ok()
    }
}
