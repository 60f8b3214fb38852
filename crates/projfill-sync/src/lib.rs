//! Outbound integrations: the RootData provider, the Pensieve registry, and
//! the superjson codec the registry speaks.

pub mod superjson;

#[cfg(feature = "http")]
pub mod pensieve;
#[cfg(feature = "http")]
pub mod rootdata;

pub use superjson::CodecError;

#[cfg(feature = "http")]
pub use pensieve::{CreatedProject, PensieveClient, RegistryError};
#[cfg(feature = "http")]
pub use rootdata::RootDataClient;
