//! Model reference parsing and wire-format detection

use std::sync::OnceLock;

use regex::Regex;

use crate::error::LlmError;
use crate::types::WireFormat;

/// Accepted provider/model separators, highest priority first.
pub const MODEL_SEPARATORS: [char; 3] = ['>', ':', '|'];

/// A parsed `(provider, model)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelReference {
    pub provider_id: String,
    pub model_id: String,
}

impl ModelReference {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
        }
    }
}

/// Parse a model reference.
///
/// Separators are tried in priority order; the first one that splits the
/// reference into two non-empty segments wins, so `openai>ft:gpt-4o:acme`
/// keeps the colons in the model id. Without a usable separator the whole
/// reference is the model id and `fallback_provider` is required.
pub fn parse_model_reference(
    reference: &str,
    fallback_provider: Option<&str>,
) -> Result<ModelReference, LlmError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(LlmError::ModelResolutionError(
            "model reference is empty".to_string(),
        ));
    }

    for sep in MODEL_SEPARATORS {
        if let Some((provider, model)) = reference.split_once(sep) {
            let (provider, model) = (provider.trim(), model.trim());
            if !provider.is_empty() && !model.is_empty() {
                return Ok(ModelReference::new(provider, model));
            }
        }
    }

    match fallback_provider.map(str::trim).filter(|p| !p.is_empty()) {
        Some(provider) => Ok(ModelReference::new(provider, reference)),
        None => Err(LlmError::ModelResolutionError(format!(
            "cannot resolve '{reference}': expected provider{}model (or one of {:?}) \
             or a fallback provider",
            MODEL_SEPARATORS[0], MODEL_SEPARATORS
        ))),
    }
}

fn anthropic_family() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"(?i)claude|anthropic").ok())
        .as_ref()
}

/// Pick the wire format for a model.
///
/// An explicit preference wins; otherwise Anthropic-family model names select
/// the Anthropic format and everything else uses the OpenAI format.
pub fn detect_wire_format(model_id: &str, preference: Option<WireFormat>) -> WireFormat {
    if let Some(pref) = preference {
        return pref;
    }
    if anthropic_family().is_some_and(|re| re.is_match(model_id)) {
        WireFormat::Anthropic
    } else {
        WireFormat::OpenAi
    }
}
