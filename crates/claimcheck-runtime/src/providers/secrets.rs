//! Credential handling for providers and the fact-check index.
//!
//! - **No accidental logging**: credentials cannot appear in Debug/Display output
//! - **Zeroed on drop** via `secrecy`
//! - **Explicit exposure**: the raw value is only reachable through `.expose()`
//!
//! ## Usage
//!
//! ```ignore
//! let cred = ApiCredential::from_config_or_env(&config, "api_key", "OPENAI_API_KEY", "OpenAI API key")?;
//! request.bearer_auth(cred.expose());
//! ```

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Loaded from configuration file/JSON
    Config,
    /// Loaded from environment variable
    Environment,
    /// Provided programmatically
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// A securely-stored API credential.
///
/// `Debug` and `Display` print `[REDACTED]`; the value is only available
/// via [`ApiCredential::expose`].
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load from JSON config, falling back to an environment variable.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        Self::lookup(config[config_key].as_str(), env_var, name).ok_or_else(|| {
            ProviderError::NotConfigured(format!(
                "{} required: set '{}' in config or {} environment variable",
                name, config_key, env_var
            ))
        })
    }

    /// Like [`ApiCredential::from_config_or_env`] for callers where a
    /// missing credential is not an error.
    pub fn lookup(configured: Option<&str>, env_var: &str, name: &'static str) -> Option<Self> {
        if let Some(value) = configured.filter(|v| !v.trim().is_empty()) {
            return Some(Self::new(value, CredentialSource::Config, name));
        }
        env_value(env_var).map(|v| Self::new(v, CredentialSource::Environment, name))
    }

    /// Same rules as [`ApiCredential::lookup`], so a blank configured key
    /// counts as missing.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        Self::lookup(config[config_key].as_str(), env_var, "").is_some()
    }

    /// Expose the value. Call only where it is needed (e.g. an HTTP header)
    /// and never store the result.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

fn env_value(env_var: &str) -> Option<String> {
    std::env::var(env_var).ok().filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_redact() {
        let secret = "AIza-secret-fact-check-key";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Fact-check API key");

        let debug = format!("{:?}", cred);
        let display = format!("{}", cred);
        assert!(!debug.contains(secret));
        assert!(!display.contains(secret));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(display, "Fact-check API key from programmatic [REDACTED]");
    }

    #[test]
    fn test_config_takes_precedence() {
        let config = serde_json::json!({"api_key": "from-config"});
        let cred = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "CLAIMCHECK_TEST_UNSET_VAR_1",
            "Test key",
        )
        .unwrap();
        assert_eq!(cred.expose(), "from-config");
        assert_eq!(cred.source(), CredentialSource::Config);
    }

    #[test]
    fn test_missing_everywhere() {
        let config = serde_json::json!({});
        let err = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "CLAIMCHECK_TEST_UNSET_VAR_2",
            "Test key",
        )
        .unwrap_err();
        assert!(err.to_string().contains("CLAIMCHECK_TEST_UNSET_VAR_2"));
        assert!(!ApiCredential::is_available(&config, "api_key", "CLAIMCHECK_TEST_UNSET_VAR_2"));
    }

    #[test]
    fn test_lookup_ignores_blank_config() {
        assert!(ApiCredential::lookup(Some("  "), "CLAIMCHECK_TEST_UNSET_VAR_3", "Test key").is_none());
        assert!(ApiCredential::lookup(Some("k"), "CLAIMCHECK_TEST_UNSET_VAR_3", "Test key").is_some());
        let blank = serde_json::json!({"api_key": ""});
        assert!(!ApiCredential::is_available(&blank, "api_key", "CLAIMCHECK_TEST_UNSET_VAR_3"));
    }
}
