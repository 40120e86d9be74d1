use std::sync::Arc;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le_at,
    metadata::tables::{
        schema::{columns, Column},
        CodedIndexType, TableId,
    },
    Error::OutOfBounds,
    Result,
};

/// Row count of one table and the width of indexes pointing into it
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// Number of rows
    pub rows: u32,
    /// Bits needed to address every row
    pub bits: u8,
    /// Whether simple indexes into this table need 4 bytes
    pub is_large: bool,
}

impl TableRowInfo {
    /// Create the row information for a table with `rows` rows
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        Self {
            rows,
            bits,
            is_large: rows > u32::from(u16::MAX),
        }
    }
}

/// Row counts of all tables and the resulting index widths.
///
/// Built from the `#~` header; used to compute the row size of every table.
#[derive(Clone, Debug)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<bool>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Shared reference to a [`TableInfo`]
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Read the row counts that follow the fixed part of the `#~` header.
    ///
    /// # Arguments
    /// * `data`            - The `#~` stream, starting at its header
    /// * `valid_bitvec`    - The mask of present tables
    /// * `heap_sizes`      - The heap size flags of the header
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row counts are truncated, or
    /// [`crate::Error::Malformed`] if the mask names a table this crate doesn't know.
    pub fn read(data: &[u8], valid_bitvec: u64, heap_sizes: u8) -> Result<Self> {
        let known = TableId::iter().fold(0_u64, |mask, id| mask | (1 << id as u8));
        if valid_bitvec & !known != 0 {
            return Err(malformed_error!(
                "Unknown tables present in valid mask - {:#018x}",
                valid_bitvec & !known
            ));
        }

        let mut counts = Vec::new();
        let mut next_row_offset = 24;
        for table_id in TableId::iter() {
            if valid_bitvec & (1 << table_id as u8) == 0 {
                continue;
            }

            if data.len() < next_row_offset {
                return Err(OutOfBounds);
            }

            counts.push((table_id, read_le_at::<u32>(data, &mut next_row_offset)?));
        }

        Ok(Self::new(&counts, heap_sizes))
    }

    /// Build table information from explicit row counts
    #[must_use]
    pub fn new(counts: &[(TableId, u32)], heap_sizes: u8) -> Self {
        let mut table_info = TableInfo {
            rows: vec![TableRowInfo::default(); 64],
            coded_indexes: vec![false; CodedIndexType::COUNT],
            is_large_index_str: heap_sizes & 1 == 1,
            is_large_index_guid: heap_sizes & 2 == 2,
            is_large_index_blob: heap_sizes & 4 == 4,
        };

        for (table, rows) in counts {
            table_info.rows[*table as usize] = TableRowInfo::new(*rows);
        }

        for coded_index in CodedIndexType::iter() {
            let max_rows = coded_index
                .tables()
                .iter()
                .map(|table| table_info.rows[*table as usize].rows)
                .max()
                .unwrap_or(0);

            table_info.coded_indexes[coded_index as usize] =
                u64::from(max_rows) >= 1_u64 << (16 - coded_index.tag_bits());
        }

        table_info
    }

    /// Row information of `table`
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Whether `#Strings` indexes use 4 bytes
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Whether `#GUID` indexes use 4 bytes
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Whether `#Blob` indexes use 4 bytes
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Whether simple indexes into `table` use 4 bytes
    #[must_use]
    pub fn is_large(&self, table: TableId) -> bool {
        self.rows[table as usize].is_large
    }

    /// Whether coded indexes of `coded_index_type` use 4 bytes
    #[must_use]
    pub fn is_large_coded(&self, coded_index_type: CodedIndexType) -> bool {
        self.coded_indexes[coded_index_type as usize]
    }

    /// Width in bytes of a single column
    #[must_use]
    pub fn column_size(&self, column: Column) -> u32 {
        let is_large = match column {
            Column::U8 => return 1,
            Column::U16 => return 2,
            Column::U32 => return 4,
            Column::Str => self.is_large_index_str,
            Column::Guid => self.is_large_index_guid,
            Column::Blob => self.is_large_index_blob,
            Column::Table(table) => self.is_large(table),
            Column::Coded(coded) => self.is_large_coded(coded),
        };

        if is_large {
            4
        } else {
            2
        }
    }

    /// Size in bytes of one row of `table`
    #[must_use]
    pub fn row_size(&self, table: TableId) -> u32 {
        columns(table)
            .iter()
            .map(|column| self.column_size(*column))
            .sum()
    }
}
