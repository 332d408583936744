//! Provider descriptors, connection options and client construction
//!
//! - `ProviderDescriptor`: immutable catalog entry for one backend
//! - `ProviderOptions`: per-connection settings (credential, base URL, headers, wire format)
//! - `ProviderClientInstance`: a realized client, cached by the registry
//! - `ProviderBuilder`: turns descriptor + options into a (possibly cached) instance

pub mod builder;
pub mod catalog;
pub mod descriptor;
pub mod instance;
pub mod options;

pub use builder::{ClientConfig, ClientConstructor, ProviderBuilder, constructor_fn};
pub use descriptor::{ConstructionKind, ModelInfo, ProviderDescriptor};
pub use instance::ProviderClientInstance;
pub use options::ProviderOptions;
