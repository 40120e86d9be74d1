use md5::{Digest, Md5};
use sha1::Sha1;

use crate::{file::io::read_le, metadata::tables::AssemblyHashAlgorithm, Error, Result};

/// The strong name part of an assembly identity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identity {
    /// The full public key
    PubKey(Vec<u8>),
    /// The public key token; its little-endian bytes are the token in display order
    Token(u64),
}

impl Identity {
    /// Create an identity from a `#Blob` entry
    ///
    /// # Arguments
    /// * `data`    - The blob content
    /// * `is_pub`  - Whether the blob holds a full public key rather than a token
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if a token blob has less than 8 bytes
    pub fn from(data: &[u8], is_pub: bool) -> Result<Self> {
        Ok(if is_pub {
            Identity::PubKey(data.to_vec())
        } else {
            Identity::Token(read_le::<u64>(data)?)
        })
    }

    /// Compute the public key token with the hash algorithm `algo`.
    ///
    /// The token is the last 8 bytes of the key's hash, in reverse order.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for hash algorithms other than MD5 and SHA1
    pub fn to_token(&self, algo: u32) -> Result<u64> {
        let digest = match &self {
            Identity::Token(token) => return Ok(*token),
            Identity::PubKey(data) => match algo {
                AssemblyHashAlgorithm::MD5 => Md5::digest(data).to_vec(),
                AssemblyHashAlgorithm::SHA1 => Sha1::digest(data).to_vec(),
                _ => return Err(Error::NotSupported),
            },
        };

        let mut token = [0_u8; 8];
        token.copy_from_slice(&digest[digest.len() - 8..]);
        token.reverse();

        Ok(u64::from_le_bytes(token))
    }

    /// The public key token as used in display names (always SHA1 based)
    ///
    /// # Errors
    /// Never fails for SHA1, kept fallible for symmetry with [`Identity::to_token`]
    pub fn public_key_token(&self) -> Result<u64> {
        self.to_token(AssemblyHashAlgorithm::SHA1)
    }
}
