use std::ffi::CStr;

use crate::{Error::OutOfBounds, Result};

/// The `#Strings` heap: null-terminated UTF-8 identifiers, §II.24.2.3
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wrap the heap data
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap doesn't start with the empty string
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// Get the string starting at `index`
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for indexes past the heap, or
    /// [`crate::Error::Malformed`] for unterminated or non UTF-8 strings
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        match CStr::from_bytes_until_nul(&self.data[index..]) {
            Ok(result) => match result.to_str() {
                Ok(result) => Ok(result),
                Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
            },
            Err(_) => Err(malformed_error!("Invalid string at index - {}", index)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        #[rustfmt::skip]
        let data = [
            /* 0  */ 0x00,
            /* 1  */ b'm', b's', b'c', b'o', b'r', b'l', b'i', b'b', 0x00,
            /* 10 */ b'<', b'M', b'o', b'd', b'u', b'l', b'e', b'>', 0x00,
            /* 19 */ b'n', b'o', b'p', b'e',
        ];

        let strings = Strings::from(&data).unwrap();

        assert_eq!(strings.get(0).unwrap(), "");
        assert_eq!(strings.get(1).unwrap(), "mscorlib");
        assert_eq!(strings.get(4).unwrap(), "orlib");
        assert_eq!(strings.get(10).unwrap(), "<Module>");
        assert!(strings.get(19).is_err());
        assert!(strings.get(23).is_err());
    }

    #[test]
    fn invalid_heap() {
        assert!(Strings::from(&[]).is_err());
        assert!(Strings::from(&[b'a', 0x00]).is_err());
    }
}
