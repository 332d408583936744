//! Core traits
//!
//! The runtime talks to backends only through these traits. Concrete vendor
//! clients live outside this crate and are plugged in via constructors
//! registered on the `ProviderBuilder`.

pub mod capabilities;
pub mod client;
pub mod language_model;

pub use capabilities::ProviderCapabilities;
pub use client::{ModelFactory, ProviderClient};
pub use language_model::LanguageModel;
