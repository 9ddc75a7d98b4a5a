//! LLM completion client
//!
//! Supports Gemini, DeepSeek, Anthropic, OpenAI, and OpenAI-compatible APIs.
//! Callers only see `prompt in, text out`.

use crate::config::LlmConfig;
use crate::error::{BotError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text completion capability
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Complete `prompt`, optionally under a system instruction
    async fn complete(&self, system: Option<String>, prompt: String) -> Result<String>;

    fn name(&self) -> &str;
}

/// HTTP-backed LLM client
pub struct LlmModel {
    http: Client,
    provider: LlmProvider,
    temperature: f32,
}

#[derive(Debug, Clone)]
pub enum LlmProvider {
    Gemini {
        api_key: String,
        model: String,
        base_url: String,
    },
    DeepSeek {
        api_key: String,
        model: String,
    },
    Anthropic {
        api_key: String,
        model: String,
        base_url: String,
    },
    OpenAI {
        api_key: String,
        model: String,
        base_url: String,
    },
    /// OpenAI-compatible API (Ollama, vLLM, etc.)
    Compatible {
        api_key: Option<String>,
        model: String,
        base_url: String,
    },
}

// ============ Request/Response types ============

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContent>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContent {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

impl LlmModel {
    pub fn new(provider: LlmProvider, temperature: f32, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            provider,
            temperature,
        })
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let provider = match config.provider.to_lowercase().as_str() {
            "gemini" | "google" => LlmProvider::Gemini {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "gemini-2.5-flash".to_string()),
                base_url: config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),
            },
            "deepseek" => LlmProvider::DeepSeek {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "deepseek-chat".to_string()),
            },
            "anthropic" | "claude" => LlmProvider::Anthropic {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "claude-sonnet-4-20250514".to_string()),
                base_url: config
                    .base_url
                    .clone()
                    .unwrap_or_else(|| "https://api.anthropic.com".to_string()),
            },
            "openai" | "gpt" => LlmProvider::OpenAI {
                api_key: config.api_key.clone(),
                model: config.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string()),
                base_url: config.base_url.clone().unwrap_or_else(|| "https://api.openai.com".to_string()),
            },
            "ollama" => LlmProvider::Compatible {
                api_key: None,
                model: config.model.clone().unwrap_or_else(|| "qwen2.5:14b".to_string()),
                base_url: config.base_url.clone().unwrap_or_else(|| "http://localhost:11434".to_string()),
            },
            "compatible" | "custom" => LlmProvider::Compatible {
                api_key: if config.api_key.is_empty() { None } else { Some(config.api_key.clone()) },
                model: config.model.clone().ok_or_else(|| BotError::Config("model required for compatible provider".into()))?,
                base_url: config.base_url.clone().ok_or_else(|| BotError::Config("base_url required for compatible provider".into()))?,
            },
            _ => return Err(BotError::Config(format!("Unknown LLM provider: {}", config.provider))),
        };

        Self::new(provider, config.temperature, Duration::from_secs(config.timeout_secs))
    }

    async fn call_openai_compatible(
        &self,
        base_url: &str,
        api_key: Option<&str>,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: prompt.to_string(),
        });

        let request = OpenAIRequest {
            model: model.to_string(),
            messages,
            temperature: self.temperature,
        };

        let mut req = self
            .http
            .post(format!("{}/v1/chat/completions", base_url))
            .header("content-type", "application/json");

        if let Some(key) = api_key {
            req = req.header("Authorization", format!("Bearer {}", key));
        }

        let resp = req.json(&request).send().await?;
        let status = resp.status();
        let text = resp.text().await?;
        tracing::debug!("LLM raw response: {}", truncate(&text, 500));

        if !status.is_success() {
            return Err(BotError::Llm(format!("HTTP {}: {}", status, truncate(&text, 200))));
        }

        let response: OpenAIResponse = serde_json::from_str(&text)
            .map_err(|e| BotError::Llm(format!("JSON parse error: {} - response: {}", e, truncate(&text, 200))))?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| BotError::Llm("Empty response from LLM".into()))
    }

    async fn call_anthropic(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String> {
        let request = AnthropicRequest {
            model: model.to_string(),
            max_tokens: 500,
            system: system.map(str::to_string),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let resp = self
            .http
            .post(format!("{}/v1/messages", base_url))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Llm(format!("HTTP {}: {}", status, truncate(&body, 200))));
        }

        let response: AnthropicResponse = resp.json().await?;

        response
            .content
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or_else(|| BotError::Llm("Empty response from Anthropic".into()))
    }

    async fn call_gemini(
        &self,
        base_url: &str,
        api_key: &str,
        model: &str,
        system: Option<&str>,
        prompt: &str,
    ) -> Result<String> {
        let request = GeminiRequest {
            system_instruction: system.map(|s| GeminiContent {
                role: None,
                parts: vec![GeminiPart { text: s.to_string() }],
            }),
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: self.temperature,
            },
        };

        let resp = self
            .http
            .post(format!("{}/v1beta/models/{}:generateContent", base_url, model))
            .header("x-goog-api-key", api_key)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(BotError::Llm(format!("HTTP {}: {}", status, truncate(&body, 200))));
        }

        let response: GeminiResponse = resp.json().await?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .map(|c| c.content.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(BotError::Llm("Empty response from Gemini".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl LlmClient for LlmModel {
    async fn complete(&self, system: Option<String>, prompt: String) -> Result<String> {
        let system = system.as_deref();
        match &self.provider {
            LlmProvider::Gemini { api_key, model, base_url } => {
                self.call_gemini(base_url, api_key, model, system, &prompt).await
            }
            LlmProvider::DeepSeek { api_key, model } => {
                self.call_openai_compatible("https://api.deepseek.com", Some(api_key), model, system, &prompt)
                    .await
            }
            LlmProvider::Anthropic { api_key, model, base_url } => {
                self.call_anthropic(base_url, api_key, model, system, &prompt).await
            }
            LlmProvider::OpenAI { api_key, model, base_url } => {
                self.call_openai_compatible(base_url, Some(api_key), model, system, &prompt)
                    .await
            }
            LlmProvider::Compatible { api_key, model, base_url } => {
                self.call_openai_compatible(base_url, api_key.as_deref(), model, system, &prompt)
                    .await
            }
        }
    }

    fn name(&self) -> &str {
        match &self.provider {
            LlmProvider::Gemini { .. } => "Gemini",
            LlmProvider::DeepSeek { .. } => "DeepSeek",
            LlmProvider::Anthropic { .. } => "Claude",
            LlmProvider::OpenAI { .. } => "GPT",
            LlmProvider::Compatible { model, .. } => model,
        }
    }
}

/// Char-boundary-safe prefix
pub(crate) fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
