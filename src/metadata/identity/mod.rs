//! Assembly identities.
//!
//! An assembly is identified by its simple name, four-part version, culture and (optionally)
//! the public key or public key token it is signed with. Identities are read from the
//! `Assembly` and `AssemblyRef` tables and are what references are bound by: an `AssemblyRef`
//! names the identity it requires, and the reference manager looks for a referenced assembly
//! whose identity can stand in for it.
//!
//! - [`AssemblyIdentity`] - name, version, culture and strong name
//! - [`AssemblyVersion`] - `major.minor.build.revision`
//! - [`Identity`] - a full public key or its 8 byte token

mod assembly;
mod cryptographic;

pub use assembly::{AssemblyIdentity, AssemblyVersion, ProcessorArchitecture};
pub use cryptographic::Identity;
