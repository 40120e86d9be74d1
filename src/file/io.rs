//! Little-endian primitive reading and writing for metadata structures.
//!
//! All multi-byte values in ECMA-335 metadata are stored little-endian. The helpers in this
//! module read and write them at explicit offsets with bounds checking, advancing the offset
//! on success. Table and heap indexes whose width depends on table sizes are handled by the
//! `_dyn` variants, and the compressed unsigned integers used as blob length prefixes (II.23.2)
//! by [`read_compressed_uint_at`] and [`write_compressed_uint`].
//!
//! # Examples
//!
//! ```rust,ignore
//! use dotbind::file::io::{read_le_at, read_le_at_dyn};
//!
//! let data = [0x34, 0x12, 0x78, 0x56, 0x00, 0x00];
//! let mut offset = 0;
//! assert_eq!(read_le_at::<u16>(&data, &mut offset)?, 0x1234);
//! assert_eq!(read_le_at_dyn(&data, &mut offset, true)?, 0x5678);
//! ```

use crate::{Error::OutOfBounds, Result};

/// Primitive types which can be read from and written to metadata buffers.
pub trait CilIO: Sized {
    /// The fixed size byte representation of the type
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Build a value from its little-endian representation
    fn from_le_bytes(bytes: Self::Bytes) -> Self;

    /// Produce the little-endian representation of the value
    fn to_le_bytes(self) -> Self::Bytes;
}

impl CilIO for u64 {
    type Bytes = [u8; 8];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u64::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u64::to_le_bytes(self)
    }
}

impl CilIO for u32 {
    type Bytes = [u8; 4];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u32::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u32::to_le_bytes(self)
    }
}

impl CilIO for u16 {
    type Bytes = [u8; 2];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u16::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u16::to_le_bytes(self)
    }
}

impl CilIO for u8 {
    type Bytes = [u8; 1];

    fn from_le_bytes(bytes: Self::Bytes) -> Self {
        u8::from_le_bytes(bytes)
    }

    fn to_le_bytes(self) -> Self::Bytes {
        u8::to_le_bytes(self)
    }
}

/// Read a value of type `T` from the start of `data`
///
/// # Arguments
/// * `data` - The buffer to read from
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if `data` is too short
pub fn read_le<T: CilIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Read a value of type `T` at `offset`, advancing `offset` past it
///
/// # Arguments
/// * `data`    - The buffer to read from
/// * `offset`  - The position to read at, updated on success
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would exceed `data`
pub fn read_le_at<T: CilIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(OutOfBounds);
    };

    *offset = end;

    Ok(T::from_le_bytes(read))
}

/// Read a 2 or 4 byte index, depending on `is_large`
///
/// # Arguments
/// * `data`        - The buffer to read from
/// * `offset`      - The position to read at, updated on success
/// * `is_large`    - Whether the index is stored with 4 bytes
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the read would exceed `data`
pub fn read_le_at_dyn(data: &[u8], offset: &mut usize, is_large: bool) -> Result<u32> {
    let res = if is_large {
        read_le_at::<u32>(data, offset)?
    } else {
        u32::from(read_le_at::<u16>(data, offset)?)
    };

    Ok(res)
}

/// Write `value` at `offset`, advancing `offset` past it
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would exceed `data`
pub fn write_le_at<T: CilIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(OutOfBounds);
    };
    if end > data.len() {
        return Err(OutOfBounds);
    }

    let bytes = value.to_le_bytes();
    data[*offset..end].copy_from_slice(bytes.as_ref());
    *offset = end;

    Ok(())
}

/// Write a 2 or 4 byte index, depending on `is_large`
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if the write would exceed `data`, or
/// [`crate::Error::Malformed`] if a small index does not fit into 2 bytes
pub fn write_le_at_dyn(
    data: &mut [u8],
    offset: &mut usize,
    value: u32,
    is_large: bool,
) -> Result<()> {
    if is_large {
        write_le_at::<u32>(data, offset, value)?;
    } else {
        let Ok(small) = u16::try_from(value) else {
            return Err(malformed_error!(
                "Index {} does not fit into a small index",
                value
            ));
        };
        write_le_at::<u16>(data, offset, small)?;
    }

    Ok(())
}

/// Read a compressed unsigned integer (ECMA-335 II.23.2) at `offset`
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] on truncated input, or [`crate::Error::Malformed`]
/// if the lead byte does not start a valid encoding
pub fn read_compressed_uint_at(data: &[u8], offset: &mut usize) -> Result<u32> {
    let first = read_le_at::<u8>(data, offset)?;

    if first & 0x80 == 0 {
        return Ok(u32::from(first));
    }

    if first & 0xC0 == 0x80 {
        let second = read_le_at::<u8>(data, offset)?;
        return Ok((u32::from(first & 0x3F) << 8) | u32::from(second));
    }

    if first & 0xE0 == 0xC0 {
        let mut value = u32::from(first & 0x1F);
        for _ in 0..3 {
            value = (value << 8) | u32::from(read_le_at::<u8>(data, offset)?);
        }
        return Ok(value);
    }

    Err(malformed_error!(
        "Invalid compressed integer lead byte - {:#04x}",
        first
    ))
}

/// Append `value` as a compressed unsigned integer (ECMA-335 II.23.2)
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if `value` exceeds `0x1FFF_FFFF`
pub fn write_compressed_uint(value: u32, out: &mut Vec<u8>) -> Result<()> {
    match value {
        0..=0x7F => out.push(value as u8),
        0x80..=0x3FFF => {
            out.push(0x80 | (value >> 8) as u8);
            out.push(value as u8);
        }
        0x4000..=0x1FFF_FFFF => {
            out.push(0xC0 | (value >> 24) as u8);
            out.push((value >> 16) as u8);
            out.push((value >> 8) as u8);
            out.push(value as u8);
        }
        _ => {
            return Err(malformed_error!(
                "Value {} is too large for a compressed integer",
                value
            ))
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BUFFER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

    #[test]
    fn read_le_u8() {
        let result = read_le::<u8>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x01);
    }

    #[test]
    fn read_le_u16() {
        let result = read_le::<u16>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0201);
    }

    #[test]
    fn read_le_u32() {
        let result = read_le::<u32>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0403_0201);
    }

    #[test]
    fn read_le_u64() {
        let result = read_le::<u64>(&TEST_BUFFER).unwrap();
        assert_eq!(result, 0x0807_0605_0403_0201);
    }

    #[test]
    fn read_le_at_advances() {
        let mut offset = 2_usize;
        let result = read_le_at::<u16>(&TEST_BUFFER, &mut offset).unwrap();
        assert_eq!(result, 0x0403);
        assert_eq!(offset, 4);
    }

    #[test]
    fn read_le_at_dyn_sizes() {
        let mut offset = 0_usize;
        assert_eq!(read_le_at_dyn(&TEST_BUFFER, &mut offset, false).unwrap(), 0x0201);
        assert_eq!(offset, 2);
        assert_eq!(read_le_at_dyn(&TEST_BUFFER, &mut offset, true).unwrap(), 0x0605_0403);
        assert_eq!(offset, 6);
    }

    #[test]
    fn errors() {
        let buffer = [0xFF, 0xFF, 0xFF, 0xFF];

        assert!(matches!(read_le::<u64>(&buffer), Err(OutOfBounds)));

        let mut offset = 3_usize;
        assert!(matches!(
            read_le_at::<u16>(&buffer, &mut offset),
            Err(OutOfBounds)
        ));
        assert_eq!(offset, 3);

        let mut offset = usize::MAX;
        assert!(matches!(
            read_le_at::<u8>(&buffer, &mut offset),
            Err(OutOfBounds)
        ));
    }

    #[test]
    fn write_le_at_dyn_sizes() {
        let mut buffer = [0_u8; 6];
        let mut offset = 0_usize;

        write_le_at_dyn(&mut buffer, &mut offset, 0x1234, false).unwrap();
        write_le_at_dyn(&mut buffer, &mut offset, 0x0102_0304, true).unwrap();

        assert_eq!(buffer, [0x34, 0x12, 0x04, 0x03, 0x02, 0x01]);
        assert_eq!(offset, 6);

        let mut offset = 0_usize;
        assert!(write_le_at_dyn(&mut buffer, &mut offset, 0x1_0000, false).is_err());
        assert!(write_le_at::<u64>(&mut buffer, &mut offset, 1).is_err());
    }

    #[test]
    fn compressed_uint() {
        #[rustfmt::skip]
        let data = [
            /* 0x03         */ 0x03,
            /* 0x3FFF       */ 0xBF, 0xFF,
            /* 0x4000       */ 0xC0, 0x00, 0x40, 0x00,
            /* invalid      */ 0xFF,
        ];

        let mut offset = 0_usize;
        assert_eq!(read_compressed_uint_at(&data, &mut offset).unwrap(), 0x03);
        assert_eq!(read_compressed_uint_at(&data, &mut offset).unwrap(), 0x3FFF);
        assert_eq!(read_compressed_uint_at(&data, &mut offset).unwrap(), 0x4000);
        assert_eq!(offset, 7);
        assert!(read_compressed_uint_at(&data, &mut offset).is_err());

        let mut out = Vec::new();
        write_compressed_uint(0x03, &mut out).unwrap();
        write_compressed_uint(0x3FFF, &mut out).unwrap();
        write_compressed_uint(0x4000, &mut out).unwrap();
        assert_eq!(out, &data[..7]);
        assert!(write_compressed_uint(0x2000_0000, &mut out).is_err());
    }
}
