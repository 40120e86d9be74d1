//! Assembly identities and versions.
//!
//! # Identity Components
//!
//! .NET assemblies are identified by the combination of:
//! - **Simple Name**: The primary assembly name (e.g., "mscorlib", "System.Core")
//! - **Version**: Four-part version number used for binding
//! - **Culture**: Localization culture (`None` for culture-neutral assemblies)
//! - **Strong Name**: Public key or public key token
//!
//! # Matching rules
//!
//! Three different comparisons are used by reference binding:
//!
//! - `==` compares name, version, culture and architecture exactly, ignoring the strong name
//!   representation (key vs. token)
//! - [`AssemblyIdentity::is_equivalent`] decides whether two references name the same assembly
//!   and one of them can be dropped as a duplicate
//! - [`AssemblyIdentity::satisfies`] and [`AssemblyIdentity::can_unify_to`] decide whether a
//!   referenced assembly can stand in for an `AssemblyRef`
//!
//! # Examples
//!
//! ```rust,ignore
//! use dotbind::metadata::identity::{AssemblyIdentity, AssemblyVersion};
//!
//! let mscorlib = AssemblyIdentity::parse(
//!     "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
//! )?;
//! assert_eq!(mscorlib.version, AssemblyVersion::new(4, 0, 0, 0));
//! assert_eq!(
//!     mscorlib.display_name(),
//!     "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
//! );
//! ```

use std::{fmt, fmt::Write as _, str::FromStr};

use crate::{metadata::identity::Identity, Error, Result};

/// Identity of an assembly: name, version, culture and strong name
#[derive(Debug, Clone)]
pub struct AssemblyIdentity {
    /// Simple name
    pub name: String,
    /// Four-part version
    pub version: AssemblyVersion,
    /// Culture, `None` if neutral
    pub culture: Option<String>,
    /// Public key or token, `None` if not strong named
    pub strong_name: Option<Identity>,
    /// Target architecture, if specified
    pub processor_architecture: Option<ProcessorArchitecture>,
}

impl PartialEq for AssemblyIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.version == other.version
            && self.culture == other.culture
            && self.processor_architecture == other.processor_architecture
        // strong_name is excluded, key and token of the same assembly compare equal
    }
}

impl Eq for AssemblyIdentity {}

impl std::hash::Hash for AssemblyIdentity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.version.hash(state);
        self.culture.hash(state);
        self.processor_architecture.hash(state);
    }
}

/// Four-part assembly version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

/// Processor architecture an assembly targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum ProcessorArchitecture {
    MSIL,
    X86,
    IA64,
    AMD64,
    ARM,
    ARM64,
}

impl AssemblyIdentity {
    /// Create an identity from its parts
    pub fn new(
        name: impl Into<String>,
        version: AssemblyVersion,
        culture: Option<String>,
        strong_name: Option<Identity>,
        processor_architecture: Option<ProcessorArchitecture>,
    ) -> Self {
        Self {
            name: name.into(),
            version,
            culture: culture.filter(|culture| !culture.is_empty() && culture != "neutral"),
            strong_name,
            processor_architecture,
        }
    }

    /// Create a culture neutral, not strong named identity
    pub fn simple(name: impl Into<String>, version: AssemblyVersion) -> Self {
        Self::new(name, version, None, None, None)
    }

    /// Parse a display name such as
    /// `System.Core, Version=3.5.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089`.
    ///
    /// Missing components default to version `0.0.0.0`, neutral culture and no strong name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty name or invalid components
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut version = AssemblyVersion::UNKNOWN;
        let mut culture = None;
        let mut strong_name = None;
        let mut processor_architecture = None;

        let mut parts = display_name.split(',').map(str::trim);

        let name = parts.next().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(malformed_error!("Assembly name cannot be empty"));
        }

        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                return Err(malformed_error!("Invalid display name component - {}", part));
            };

            match key.trim() {
                "Version" => version = AssemblyVersion::parse(value.trim())?,
                "Culture" => culture = Some(value.trim().to_string()),
                "PublicKeyToken" => {
                    let value = value.trim();
                    if value != "null" && !value.is_empty() {
                        let token_bytes = hex::decode(value).map_err(|e| {
                            malformed_error!("Invalid hex in PublicKeyToken '{}': {}", value, e)
                        })?;

                        let Ok(token_array) = <[u8; 8]>::try_from(token_bytes.as_slice()) else {
                            return Err(malformed_error!(
                                "PublicKeyToken must be exactly 8 bytes, got {} bytes from '{}'",
                                token_bytes.len(),
                                value
                            ));
                        };

                        strong_name = Some(Identity::Token(u64::from_le_bytes(token_array)));
                    }
                }
                "PublicKey" => {
                    let value = value.trim();
                    if value != "null" && !value.is_empty() {
                        let key = hex::decode(value).map_err(|e| {
                            malformed_error!("Invalid hex in PublicKey '{}': {}", value, e)
                        })?;
                        strong_name = Some(Identity::PubKey(key));
                    }
                }
                "ProcessorArchitecture" => {
                    processor_architecture = Some(ProcessorArchitecture::parse(value)?);
                }
                _ => {}
            }
        }

        Ok(Self::new(
            name,
            version,
            culture,
            strong_name,
            processor_architecture,
        ))
    }

    /// Format the display name of this identity
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);

        result.push_str(&self.name);

        let _ = write!(result, ", Version={}", self.version);
        let _ = write!(
            result,
            ", Culture={}",
            self.culture.as_deref().unwrap_or("neutral")
        );

        result.push_str(", PublicKeyToken=");
        match self.public_key_token() {
            Some(token) => result.push_str(&hex::encode(token.to_le_bytes())),
            None => result.push_str("null"),
        }

        if let Some(arch) = &self.processor_architecture {
            let _ = write!(result, ", ProcessorArchitecture={}", arch);
        }

        result
    }

    /// The public key token, computed from the public key if necessary
    #[must_use]
    pub fn public_key_token(&self) -> Option<u64> {
        self.strong_name
            .as_ref()
            .and_then(|identity| identity.public_key_token().ok())
    }

    /// Whether the identity carries a strong name
    #[must_use]
    pub fn is_strong_named(&self) -> bool {
        self.strong_name.is_some()
    }

    fn same_name_and_culture(&self, other: &AssemblyIdentity) -> bool {
        self.name.eq_ignore_ascii_case(&other.name)
            && match (&self.culture, &other.culture) {
                (None, None) => true,
                (Some(left), Some(right)) => left.eq_ignore_ascii_case(right),
                _ => false,
            }
    }

    /// Whether `self` and `other` name the same assembly for duplicate detection:
    /// case-insensitive name and culture, equal version and equal public key token.
    #[must_use]
    pub fn is_equivalent(&self, other: &AssemblyIdentity) -> bool {
        self.same_name_and_culture(other)
            && self.version == other.version
            && self.public_key_token() == other.public_key_token()
    }

    /// Whether `self` and `other` have the same name, culture and key but differ in version
    #[must_use]
    pub fn is_other_version_of(&self, other: &AssemblyIdentity) -> bool {
        self.same_name_and_culture(other)
            && self.version != other.version
            && self.public_key_token() == other.public_key_token()
    }

    /// Whether this assembly satisfies the `required` identity under strict versioning:
    /// case-insensitive name, equal culture and a compatible version
    /// (see [`AssemblyVersion::is_compatible_with`]).
    #[must_use]
    pub fn satisfies(&self, required: &AssemblyIdentity) -> bool {
        self.same_name_and_culture(required) && self.version.is_compatible_with(&required.version)
    }

    /// Whether a reference to `required` may bind to this assembly, possibly after unifying
    /// its version upwards: same name and culture, the same public key token if `required` is
    /// strong named, and a version that is not lower.
    #[must_use]
    pub fn can_unify_to(&self, required: &AssemblyIdentity) -> bool {
        if !self.same_name_and_culture(required) {
            return false;
        }

        if let Some(token) = required.public_key_token() {
            if self.public_key_token() != Some(token) {
                return false;
            }
        }

        self.version >= required.version
    }
}

impl AssemblyVersion {
    /// Version `0.0.0.0`
    pub const UNKNOWN: Self = Self {
        major: 0,
        minor: 0,
        build: 0,
        revision: 0,
    };

    /// Create a version from its parts
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        Self {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Whether this is `0.0.0.0`
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        self.major == 0 && self.minor == 0 && self.build == 0 && self.revision == 0
    }

    /// Whether this version can serve a reference to `required`: same major version and not
    /// lower. An unknown required version accepts any version.
    #[must_use]
    pub fn is_compatible_with(&self, required: &AssemblyVersion) -> bool {
        if required.is_unknown() {
            return true;
        }

        self.major == required.major && *self >= *required
    }

    /// Parse a dotted version with one to four components
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for more than four or non numeric components
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.split('.').collect();

        if parts.is_empty() || parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(Self::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl ProcessorArchitecture {
    /// Parse an architecture name as used in display names
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for unknown names
    pub fn parse(arch_str: &str) -> Result<Self> {
        match arch_str.trim().to_lowercase().as_str() {
            "msil" => Ok(Self::MSIL),
            "x86" => Ok(Self::X86),
            "ia64" => Ok(Self::IA64),
            "amd64" | "x64" => Ok(Self::AMD64),
            "arm" => Ok(Self::ARM),
            "arm64" => Ok(Self::ARM64),
            _ => Err(malformed_error!(
                "Unknown processor architecture: '{}'",
                arch_str.trim()
            )),
        }
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl fmt::Display for ProcessorArchitecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arch_str = match self {
            Self::MSIL => "MSIL",
            Self::X86 => "x86",
            Self::IA64 => "IA64",
            Self::AMD64 => "AMD64",
            Self::ARM => "ARM",
            Self::ARM64 => "ARM64",
        };
        write!(f, "{}", arch_str)
    }
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for AssemblyIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl FromStr for AssemblyVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MSCORLIB: &str =
        "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089";

    #[test]
    fn parse_and_display() {
        let identity = AssemblyIdentity::parse(MSCORLIB).unwrap();

        assert_eq!(identity.name, "mscorlib");
        assert_eq!(identity.version, AssemblyVersion::new(4, 0, 0, 0));
        assert!(identity.culture.is_none());
        assert!(identity.is_strong_named());
        assert_eq!(identity.display_name(), MSCORLIB);
        assert_eq!(identity.to_string(), MSCORLIB);
    }

    #[test]
    fn parse_minimal() {
        let identity: AssemblyIdentity = "Test1".parse().unwrap();

        assert_eq!(identity.version, AssemblyVersion::UNKNOWN);
        assert_eq!(
            identity.display_name(),
            "Test1, Version=0.0.0.0, Culture=neutral, PublicKeyToken=null"
        );

        let identity =
            AssemblyIdentity::parse("Res, Version=1.2, Culture=de-DE, ProcessorArchitecture=x64")
                .unwrap();
        assert_eq!(identity.version, AssemblyVersion::new(1, 2, 0, 0));
        assert_eq!(identity.culture.as_deref(), Some("de-DE"));
        assert_eq!(
            identity.processor_architecture,
            Some(ProcessorArchitecture::AMD64)
        );
    }

    #[test]
    fn parse_invalid() {
        assert!(AssemblyIdentity::parse("").is_err());
        assert!(AssemblyIdentity::parse(", Version=1.0.0.0").is_err());
        assert!(AssemblyIdentity::parse("A, Version=1.x").is_err());
        assert!(AssemblyIdentity::parse("A, PublicKeyToken=abcd").is_err());
        assert!(AssemblyIdentity::parse("A, Version").is_err());
        assert!(AssemblyVersion::parse("1.2.3.4.5").is_err());
    }

    #[test]
    fn equality_ignores_key_representation() {
        // ECMA standard key and its token
        let key = Identity::PubKey(vec![0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0]);
        let with_key = AssemblyIdentity::new(
            "mscorlib",
            AssemblyVersion::new(4, 0, 0, 0),
            None,
            Some(key),
            None,
        );
        let with_token = AssemblyIdentity::parse(MSCORLIB).unwrap();

        assert_eq!(with_key, with_token);
        assert!(with_key.is_equivalent(&with_token));
        assert_eq!(with_key.display_name(), MSCORLIB);
    }

    #[test]
    fn equivalence() {
        let a = AssemblyIdentity::parse("Lib, Version=1.0.0.0").unwrap();
        let b = AssemblyIdentity::parse("LIB, Version=1.0.0.0, Culture=neutral").unwrap();
        let c = AssemblyIdentity::parse("Lib, Version=2.0.0.0").unwrap();
        let d = AssemblyIdentity::parse("Lib, Version=1.0.0.0, Culture=en-US").unwrap();

        assert!(a.is_equivalent(&b));
        assert!(!a.is_equivalent(&c));
        assert!(a.is_other_version_of(&c));
        assert!(!a.is_equivalent(&d));
        assert!(!a.is_other_version_of(&d));
    }

    #[test]
    fn satisfies_and_unification() {
        let v1 = AssemblyIdentity::parse("MTTestLib1, Version=1.0.0.0").unwrap();
        let v1_5 = AssemblyIdentity::parse("MTTestLib1, Version=1.5.0.0").unwrap();
        let v2 = AssemblyIdentity::parse("MTTestLib1, Version=2.0.0.0").unwrap();
        let any = AssemblyIdentity::parse("mttestlib1").unwrap();

        assert!(v1.satisfies(&v1));
        assert!(v1_5.satisfies(&v1));
        assert!(!v2.satisfies(&v1));
        assert!(!v1.satisfies(&v1_5));
        assert!(v2.satisfies(&any));

        assert!(v2.can_unify_to(&v1));
        assert!(!v1.can_unify_to(&v2));

        let strong = AssemblyIdentity::parse(
            "MTTestLib1, Version=1.0.0.0, PublicKeyToken=0123456789abcdef",
        )
        .unwrap();
        assert!(!v2.can_unify_to(&strong));
        assert!(strong.can_unify_to(&v1));
    }

    #[test]
    fn version_compatibility() {
        let required = AssemblyVersion::new(4, 0, 0, 0);

        assert!(AssemblyVersion::new(4, 0, 0, 0).is_compatible_with(&required));
        assert!(AssemblyVersion::new(4, 5, 0, 0).is_compatible_with(&required));
        assert!(!AssemblyVersion::new(3, 9, 0, 0).is_compatible_with(&required));
        assert!(!AssemblyVersion::new(5, 0, 0, 0).is_compatible_with(&required));
        assert!(AssemblyVersion::new(1, 0, 0, 0).is_compatible_with(&AssemblyVersion::UNKNOWN));
        assert_eq!(
            "1.2.3.4".parse::<AssemblyVersion>().unwrap().to_string(),
            "1.2.3.4"
        );
    }
}
