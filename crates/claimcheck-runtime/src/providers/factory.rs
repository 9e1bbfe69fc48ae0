//! Selects a text generation backend from [`ProviderSettings`].
//!
//! Each backend registers a [`ProviderFactory`]. The registry overlays the
//! user's `provider.options` on the factory defaults, validates the merged
//! object and only then builds the provider, so a missing key surfaces at
//! startup rather than on the first claim.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use super::{LlmProvider, ProviderError};
use crate::config::ProviderSettings;

/// Builds providers of one backend type from JSON options.
pub trait ProviderFactory: Send + Sync {
    /// Name used in `provider.type`.
    fn provider_type(&self) -> &'static str;

    fn create(&self, options: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError>;

    /// Reject options that could never produce a working provider.
    fn validate_config(&self, options: &JsonValue) -> Result<(), ProviderError>;

    /// Options applied when the user leaves a field out.
    fn default_config(&self) -> JsonValue {
        JsonValue::Object(Map::new())
    }
}

#[derive(Default)]
pub struct ProviderRegistry {
    factories: BTreeMap<&'static str, Arc<dyn ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every backend compiled into this build.
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();
        #[cfg(feature = "anthropic")]
        registry.register(Arc::new(super::AnthropicProviderFactory));
        #[cfg(feature = "openai")]
        registry.register(Arc::new(super::OpenAiProviderFactory));
        registry
    }

    /// Later registrations replace earlier ones of the same type.
    pub fn register(&mut self, factory: Arc<dyn ProviderFactory>) {
        self.factories.insert(factory.provider_type(), factory);
    }

    pub fn available_types(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Build the provider named by `settings`.
    pub fn create(&self, settings: &ProviderSettings) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let factory = self
            .factories
            .get(settings.provider_type.as_str())
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "unknown provider type '{}', expected one of {:?}",
                    settings.provider_type,
                    self.available_types()
                ))
            })?;

        let options = merge_options(factory.default_config(), &settings.options)?;
        factory.validate_config(&options)?;

        let provider = factory.create(&options)?;
        tracing::info!(
            provider = provider.name(),
            base_url = options["base_url"].as_str().unwrap_or("default"),
            "Text generation provider ready"
        );
        Ok(provider)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.available_types())
            .finish()
    }
}

/// Shallow overlay of user options on factory defaults. `null` options mean
/// "use the defaults".
fn merge_options(defaults: JsonValue, options: &JsonValue) -> Result<JsonValue, ProviderError> {
    let mut merged = match defaults {
        JsonValue::Object(map) => map,
        _ => Map::new(),
    };
    match options {
        JsonValue::Null => {}
        JsonValue::Object(user) => {
            for (key, value) in user {
                merged.insert(key.clone(), value.clone());
            }
        }
        other => {
            return Err(ProviderError::NotConfigured(format!(
                "provider.options must be a mapping, got {other}"
            )))
        }
    }
    Ok(JsonValue::Object(merged))
}

/// Shared check for an optional `base_url` field.
pub(crate) fn validate_base_url(options: &JsonValue) -> Result<(), ProviderError> {
    match options.get("base_url") {
        None | Some(JsonValue::Null) => Ok(()),
        Some(JsonValue::String(url)) if url.starts_with("http://") || url.starts_with("https://") => {
            Ok(())
        }
        Some(_) => Err(ProviderError::NotConfigured(
            "base_url must be an http:// or https:// URL".to_string(),
        )),
    }
}
