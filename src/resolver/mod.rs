//! Model Resolver
//!
//! Parses a model reference (`provider>model`, `provider:model`,
//! `provider|model`, or a bare model id plus fallback provider), picks the
//! wire format, obtains a model handle from the provider builder, applies
//! middleware and caches the result when no middleware is attached.

pub mod reference;
mod resolver;

pub use reference::{MODEL_SEPARATORS, ModelReference, detect_wire_format, parse_model_reference};
pub use resolver::{ModelResolver, ResolvedModel, ResolverOptions};
