//! The metadata root, §II.24.2.1.
//!
//! The root starts with the `BSJB` signature, names the runtime version the image was built
//! against and lists the streams that follow it. Stream offsets are relative to the start of
//! the root.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Signature of the metadata root (`BSJB` read as little-endian `u32`)
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The parsed metadata root
#[derive(Debug, Clone)]
pub struct Root {
    /// Always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version (1)
    pub major_version: u16,
    /// Minor version (1)
    pub minor_version: u16,
    /// Length of the padded version string
    pub length: u32,
    /// Runtime version the image targets, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved
    pub flags: u16,
    /// The streams of this image, in header order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root at the start of `data`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the root or a stream extends past `data`, and
    /// [`crate::Error::Malformed`] for a wrong signature, unknown or duplicate streams
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let version_string_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(version_end) = version_string_length.checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                version_string_length
            ));
        };
        if version_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let version_bytes = &data[16..version_end];
        let version_len = version_bytes
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(version_bytes.len());
        let version = String::from_utf8_lossy(&version_bytes[..version_len]).into_owned();

        let mut offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 || stream_count as usize > 7 {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut streams: Vec<StreamHeader> = Vec::with_capacity(stream_count as usize);
        for _ in 0..stream_count {
            if offset > data.len() {
                return Err(OutOfBounds);
            }

            let new_stream = StreamHeader::from(&data[offset..])?;
            match u32::checked_add(new_stream.offset, new_stream.size) {
                Some(range) => {
                    if range as usize > data.len() {
                        return Err(OutOfBounds);
                    }
                }
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        new_stream.offset,
                        new_stream.size
                    ))
                }
            }

            if streams.iter().any(|stream| stream.name == new_stream.name) {
                return Err(malformed_error!("Duplicate stream - {}", new_stream.name));
            }

            offset += new_stream.header_len();
            streams.push(new_stream);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            length: u32::try_from(version_string_length)
                .map_err(|_| malformed_error!("Version string length too large"))?,
            version,
            flags,
            stream_headers: streams,
        })
    }

    /// Look up a stream by name
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }

    /// The bytes of the stream `name` within `data` (the metadata root)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the stream lies outside `data`
    pub fn stream_data<'a>(&self, data: &'a [u8], name: &str) -> Result<Option<&'a [u8]>> {
        let Some(stream) = self.stream(name) else {
            return Ok(None);
        };

        let start = stream.offset as usize;
        let end = start + stream.size as usize;
        if end > data.len() {
            return Err(OutOfBounds);
        }

        Ok(Some(&data[start..end]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let header_bytes = [
            /* signature     */ 0x42, 0x53, 0x4A, 0x42,
            /* major         */ 0x01, 0x00,
            /* minor         */ 0x01, 0x00,
            /* reserved      */ 0x00, 0x00, 0x00, 0x00,
            /* length        */ 0x08, 0x00, 0x00, 0x00,
            /* version       */ b'v', b'4', b'.', b'0', 0x00, 0x00, 0x00, 0x00,
            /* flags         */ 0x00, 0x00,
            /* streams       */ 0x02, 0x00,
            /* #~            */ 0x38, 0x00, 0x00, 0x00, 0x04, 0x00, 0x00, 0x00, b'#', b'~', 0x00, 0x00,
            /* #GUID         */ 0x3C, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, b'#', b'G', b'U', b'I', b'D', 0x00, 0x00, 0x00,
            /* #~ data       */ 0xAA, 0xBB, 0xCC, 0xDD,
        ];

        let root = Root::read(&header_bytes).unwrap();

        assert_eq!(root.signature, CIL_HEADER_MAGIC);
        assert_eq!(root.major_version, 1);
        assert_eq!(root.minor_version, 1);
        assert_eq!(root.length, 8);
        assert_eq!(root.version, "v4.0");
        assert_eq!(root.stream_headers.len(), 2);
        assert_eq!(root.stream("#~").unwrap().offset, 0x38);
        assert_eq!(
            root.stream_data(&header_bytes, "#~").unwrap().unwrap(),
            &[0xAA, 0xBB, 0xCC, 0xDD]
        );
        assert!(root.stream_data(&header_bytes, "#Blob").unwrap().is_none());
    }

    #[test]
    fn invalid() {
        let mut data = [0_u8; 40];
        assert!(Root::read(&data).is_err());

        data[..4].copy_from_slice(b"BSJB");
        data[12] = 0xFF;
        assert!(Root::read(&data).is_err());

        // no streams
        data[12] = 0x04;
        assert!(Root::read(&data).is_err());
    }
}
