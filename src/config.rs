//! Process-wide configuration, built once at startup.

use secrecy::{ExposeSecret, SecretString};

/// Default Gemini API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default image-capable model.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

/// Primary environment variable holding the API key.
pub const API_KEY_VAR: &str = "API_KEY";
/// Fallback environment variable holding the API key.
pub const GEMINI_API_KEY_VAR: &str = "GEMINI_API_KEY";
/// Optional base URL override.
pub const BASE_URL_VAR: &str = "GEMINI_BASE_URL";
/// Optional model override.
pub const MODEL_VAR: &str = "GEMINI_MODEL";

/// Credentials and endpoint settings for the processing client.
#[derive(Debug)]
pub struct Config {
    api_key: SecretString,
    /// Base URL of the Gemini REST API, without trailing slash.
    pub base_url: String,
    /// Model used for `generateContent`.
    pub model: String,
}

impl Config {
    /// Create a configuration with the given API key and default endpoint.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Build from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`](crate::Error::MissingApiKey) if neither
    /// `API_KEY` nor `GEMINI_API_KEY` is set to a non-empty value.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingApiKey`](crate::Error::MissingApiKey) if no key is found.
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = non_empty(API_KEY_VAR)
            .or_else(|| non_empty(GEMINI_API_KEY_VAR))
            .ok_or(crate::Error::MissingApiKey)?;

        let mut config = Self::new(api_key);
        if let Some(base_url) = non_empty(BASE_URL_VAR) {
            config = config.with_base_url(base_url);
        }
        if let Some(model) = non_empty(MODEL_VAR) {
            config = config.with_model(model);
        }
        Ok(config)
    }

    /// Set the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the base URL.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub(crate) fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    /// Full `generateContent` endpoint for the configured model.
    #[must_use]
    pub fn generate_content_url(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn missing_key_is_fatal() {
        let err = Config::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, crate::Error::MissingApiKey));

        let err = Config::from_lookup(lookup_from(&[(API_KEY_VAR, "  ")])).unwrap_err();
        assert!(matches!(err, crate::Error::MissingApiKey));
    }

    #[test]
    fn api_key_falls_back_to_gemini_variable() {
        let config = Config::from_lookup(lookup_from(&[(GEMINI_API_KEY_VAR, "k2")])).unwrap();
        assert_eq!(config.api_key(), "k2");

        let config =
            Config::from_lookup(lookup_from(&[(API_KEY_VAR, "k1"), (GEMINI_API_KEY_VAR, "k2")]))
                .unwrap();
        assert_eq!(config.api_key(), "k1");
    }

    #[test]
    fn overrides_apply_and_url_is_built() {
        let config = Config::from_lookup(lookup_from(&[
            (API_KEY_VAR, "k"),
            (BASE_URL_VAR, "http://localhost:9000/"),
            (MODEL_VAR, "test-model"),
        ]))
        .unwrap();
        assert_eq!(
            config.generate_content_url(),
            "http://localhost:9000/models/test-model:generateContent"
        );
    }

    #[test]
    fn defaults_target_gemini_image_model() {
        let config = Config::new("k");
        assert_eq!(
            config.generate_content_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image:generateContent"
        );
    }

    #[test]
    fn debug_output_hides_key() {
        let config = Config::new("super-secret");
        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
