//! Anthropic Messages API provider.

use super::{
    build_client, check_status, send_error,
    factory::ProviderFactory,
    secrets::{ApiCredential, CredentialSource},
    ChatMessage, CompletionConfig, CompletionResponse, LlmProvider, ProviderError, TokenUsage,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Environment variable name for the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";

/// Appended to the system prompt when a JSON reply is requested; the
/// Messages API has no response-format switch.
const JSON_INSTRUCTION: &str = "Respond with a single JSON object and nothing else.";

/// Statuses the Messages API uses for "overloaded".
const OVERLOADED: &[u16] = &[529];

pub struct AnthropicProvider {
    credential: ApiCredential,
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for AnthropicProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicProvider")
            .field("credential", &self.credential)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl AnthropicProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            credential: ApiCredential::new(
                api_key,
                CredentialSource::Programmatic,
                "Anthropic API key",
            ),
            base_url: DEFAULT_BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// `api_key` comes from the options, then `ANTHROPIC_API_KEY`.
    pub fn from_config(config: &JsonValue) -> Result<Self, ProviderError> {
        let credential = ApiCredential::from_config_or_env(
            config,
            "api_key",
            ANTHROPIC_API_KEY_ENV,
            "Anthropic API key",
        )?;

        let base_url = config["base_url"]
            .as_str()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            credential,
            base_url,
            client: build_client()?,
        })
    }
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    system: Vec<ContentBlock>,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: Vec<ContentBlock>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
}

#[derive(Debug, Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    type_: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlockResponse>,
    model: String,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct ContentBlockResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
    #[serde(default)]
    cache_creation_input_tokens: u32,
    #[serde(default)]
    cache_read_input_tokens: u32,
}

fn text_block(text: String, cached: bool) -> ContentBlock {
    ContentBlock::Text {
        text,
        cache_control: cached.then(|| CacheControl {
            type_: "ephemeral".to_string(),
        }),
    }
}

/// System prompts are fixed per capability and repeat for every claim, so
/// they carry the cache breakpoint. Claim prompts do not.
fn build_request(messages: Vec<ChatMessage>, config: &CompletionConfig) -> AnthropicRequest {
    let (system, turns): (Vec<ChatMessage>, Vec<ChatMessage>) =
        messages.into_iter().partition(|msg| msg.role == "system");

    let mut system_text = system
        .into_iter()
        .map(|msg| msg.content)
        .collect::<Vec<_>>()
        .join("\n\n");
    if config.json_mode {
        if !system_text.is_empty() {
            system_text.push_str("\n\n");
        }
        system_text.push_str(JSON_INSTRUCTION);
    }

    let system = if system_text.is_empty() {
        Vec::new()
    } else {
        vec![text_block(system_text, config.prompt_caching)]
    };

    let messages = turns
        .into_iter()
        .map(|msg| AnthropicMessage {
            role: msg.role,
            content: vec![text_block(msg.content, false)],
        })
        .collect();

    AnthropicRequest {
        model: config.model.clone(),
        max_tokens: config.max_tokens,
        system,
        messages,
        temperature: (config.temperature != 0.0).then_some(config.temperature),
    }
}

#[async_trait]
impl LlmProvider for AnthropicProvider {
    async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        let request = build_request(messages, config);

        let response = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", self.credential.expose())
            .header("anthropic-version", "2023-06-01")
            .timeout(config.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| send_error(e, config.timeout))?;
        let response = check_status(response, OVERLOADED).await?;

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<String>();

        Ok(CompletionResponse {
            content,
            usage: TokenUsage {
                prompt_tokens: body.usage.input_tokens,
                completion_tokens: body.usage.output_tokens,
                cache_read_tokens: body.usage.cache_read_input_tokens,
                cache_creation_tokens: body.usage.cache_creation_input_tokens,
            },
            model: body.model,
            stop_reason: body.stop_reason,
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

/// `provider.type: anthropic`. Options: `api_key` (else `ANTHROPIC_API_KEY`)
/// and `base_url`.
pub struct AnthropicProviderFactory;

impl ProviderFactory for AnthropicProviderFactory {
    fn provider_type(&self) -> &'static str {
        "anthropic"
    }

    fn create(&self, config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        let provider = AnthropicProvider::from_config(config)?;
        Ok(Arc::new(provider))
    }

    fn validate_config(&self, config: &JsonValue) -> Result<(), ProviderError> {
        if !ApiCredential::is_available(config, "api_key", ANTHROPIC_API_KEY_ENV) {
            return Err(ProviderError::NotConfigured(format!(
                "Anthropic API key required: set 'api_key' in config or {} env",
                ANTHROPIC_API_KEY_ENV
            )));
        }
        super::factory::validate_base_url(config)
    }

    fn default_config(&self) -> JsonValue {
        serde_json::json!({ "base_url": DEFAULT_BASE_URL })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_creation() {
        let provider = AnthropicProvider::new("test-key");
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_system_messages_merged_and_json_instruction_appended() {
        let config = CompletionConfig {
            json_mode: true,
            prompt_caching: false,
            ..Default::default()
        };
        let request = build_request(
            vec![
                ChatMessage::system("You are a strict fact checker."),
                ChatMessage::user("Claim: water boils at 90C at sea level"),
            ],
            &config,
        );

        let json = serde_json::to_value(&request).unwrap();
        let system = json["system"][0]["text"].as_str().unwrap();
        assert!(system.starts_with("You are a strict fact checker."));
        assert!(system.ends_with(JSON_INSTRUCTION));
        assert!(json["system"][0].get("cache_control").is_none());
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.temperature, None);
    }

    #[test]
    fn test_only_system_prompt_is_cached() {
        let request = build_request(
            vec![ChatMessage::system("Assess plausibility."), ChatMessage::user("Claim: x")],
            &CompletionConfig::default(),
        );
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["system"][0]["cache_control"]["type"], "ephemeral");
        assert!(json["messages"][0]["content"][0].get("cache_control").is_none());
    }

    #[test]
    fn test_no_system_block_without_system_prompt() {
        let request = build_request(vec![ChatMessage::user("hi")], &CompletionConfig::default());
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_factory_create_with_api_key() {
        let factory = AnthropicProviderFactory;
        let provider = factory.create(&serde_json::json!({"api_key": "test-api-key"}));
        assert_eq!(provider.unwrap().name(), "anthropic");
    }

    #[test]
    fn test_factory_validate_invalid_base_url() {
        let factory = AnthropicProviderFactory;
        let config = serde_json::json!({
            "api_key": "test-key",
            "base_url": "invalid-url"
        });
        assert!(factory.validate_config(&config).is_err());
    }

    #[test]
    fn test_debug_redacts_key() {
        let debug = format!("{:?}", AnthropicProvider::new("sk-ant-abc123"));
        assert!(!debug.contains("sk-ant-abc123"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_from_config_with_api_key() {
        let config = serde_json::json!({
            "api_key": "config-api-key",
            "base_url": "https://custom.api.com/v1/"
        });

        let provider = AnthropicProvider::from_config(&config).unwrap();
        assert_eq!(provider.base_url, "https://custom.api.com/v1");
        assert_eq!(provider.credential.expose(), "config-api-key");
        assert_eq!(provider.credential.source(), CredentialSource::Config);
    }
}
