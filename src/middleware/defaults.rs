//! Default-settings middleware

use crate::middleware::language_model::LanguageModelMiddleware;
use crate::types::CallParams;

/// Fill sampling settings the caller left unset.
#[derive(Debug, Clone, Default)]
pub struct DefaultSettingsMiddleware {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl DefaultSettingsMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

impl LanguageModelMiddleware for DefaultSettingsMiddleware {
    fn transform_params(&self, mut params: CallParams) -> CallParams {
        if params.temperature.is_none() {
            params.temperature = self.temperature;
        }
        if params.max_tokens.is_none() {
            params.max_tokens = self.max_tokens;
        }
        if params.top_p.is_none() {
            params.top_p = self.top_p;
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_only_missing_settings() {
        let mw = DefaultSettingsMiddleware::new()
            .with_temperature(0.2)
            .with_max_tokens(512);
        let params = CallParams::default().with_temperature(0.9);
        let out = mw.transform_params(params);
        assert_eq!(out.temperature, Some(0.9));
        assert_eq!(out.max_tokens, Some(512));
        assert_eq!(out.top_p, None);
    }
}
