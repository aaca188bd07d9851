/*!
 * The three per-chunk language-model services, plus terminology extraction.
 *
 * [`ChunkServices`] is the seam between the pipeline and the network: the
 * pipeline only sees translate, critique and repair calls. [`LlmServices`]
 * implements it on top of an [`LlmClient`], retrying transient transport
 * failures with exponential backoff.
 */

use async_trait::async_trait;
use log::{debug, error, warn};
use parking_lot::Mutex;
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

use crate::app_config::Config;
use crate::errors::{ProviderError, TranslationError};
use crate::language_utils;
use crate::providers::{ChatPrompt, LlmClient};
use crate::translation::prompts::PromptBuilder;
use crate::translation::terminology::TerminologyMap;

/// Verdict of the verification service for one candidate translation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CritiqueVerdict {
    /// Every mask token survived exactly once
    pub safe: bool,
    /// LaTeX structure is intact
    pub syntax_valid: bool,
    /// Translation is complete and fluent
    pub quality_pass: bool,
    pub errors: Vec<String>,
}

impl CritiqueVerdict {
    pub fn passing() -> Self {
        Self {
            safe: true,
            syntax_valid: true,
            quality_pass: true,
            errors: Vec::new(),
        }
    }

    pub fn failing(errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    /// All three checks hold
    pub fn passed(&self) -> bool {
        self.safe && self.syntax_valid && self.quality_pass
    }
}

/// Operations one chunk pipeline needs
#[async_trait]
pub trait ChunkServices: Send + Sync {
    /// First-pass translation of a masked chunk
    async fn translate(&self, chunk: &str, terminology: &TerminologyMap) -> Result<String, TranslationError>;

    /// Judge a candidate translation against its original
    async fn critique(&self, original: &str, translated: &str) -> Result<CritiqueVerdict, TranslationError>;

    /// Rewrite a failed translation given the reported errors
    async fn repair(
        &self,
        original: &str,
        failed: &str,
        errors: &[String],
        terminology: &TerminologyMap,
    ) -> Result<String, TranslationError>;
}

/// Pull a JSON object out of a model answer that may wrap it in prose or fences
pub fn extract_json(response: &str) -> Option<&str> {
    let trimmed = response.trim();

    if trimmed.starts_with('{') {
        return Some(trimmed);
    }

    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed[start + 7..].find("```") {
            return Some(trimmed[start + 7..start + 7 + end].trim());
        }
    }

    if let Some(start) = trimmed.find("```") {
        if let Some(end) = trimmed[start + 3..].find("```") {
            let inner = trimmed[start + 3..start + 3 + end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if end > start => Some(&trimmed[start..=end]),
        _ => None,
    }
}

/// Strip a single surrounding code fence from a text answer
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(body) = rest.strip_suffix("```") {
            // drop the info string, e.g. ```latex
            return match body.find('\n') {
                Some(newline) => body[newline + 1..].trim_end(),
                None => body.trim(),
            };
        }
    }
    trimmed
}

/// Parse a critique answer; absent flags count as failed
pub fn parse_critique_response(response: &str) -> Result<CritiqueVerdict, TranslationError> {
    let json = extract_json(response)
        .ok_or_else(|| TranslationError::MalformedCritique("no JSON object in response".to_string()))?;
    let value: Value =
        serde_json::from_str(json).map_err(|e| TranslationError::MalformedCritique(e.to_string()))?;
    if !value.is_object() {
        return Err(TranslationError::MalformedCritique("verdict is not an object".to_string()));
    }

    let flag = |key: &str| value.get(key).and_then(Value::as_bool).unwrap_or(false);
    let errors = match value.get("errors") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        Some(Value::String(single)) => vec![single.clone()],
        Some(_) => {
            return Err(TranslationError::MalformedCritique("errors is not a list".to_string()));
        }
    };

    Ok(CritiqueVerdict {
        safe: flag("safe"),
        syntax_valid: flag("syntax_valid"),
        quality_pass: flag("quality_pass"),
        errors,
    })
}

/// Parse a terminology answer; anything unusable yields an empty map
pub fn parse_terminology_response(response: &str) -> TerminologyMap {
    extract_json(response)
        .and_then(|json| serde_json::from_str::<Value>(json).ok())
        .map(|value| TerminologyMap::from_json_value(&value))
        .unwrap_or_default()
}

/// Temperatures of the four services
#[derive(Debug, Clone, Copy)]
pub struct ServiceTemperatures {
    pub translate: f32,
    pub critique: f32,
    pub repair: f32,
    pub terminology: f32,
}

/// Chunk services backed by a language-model provider
#[derive(Debug)]
pub struct LlmServices {
    client: LlmClient,
    prompts: PromptBuilder,
    temperatures: ServiceTemperatures,
    /// Transport retries after the first attempt
    retry_count: u32,
    /// Base backoff time in milliseconds for exponential backoff
    backoff_base_ms: u64,
    /// Minimum spacing between requests when the provider is rate limited
    min_interval: Option<Duration>,
    next_slot: Mutex<Option<Instant>>,
}

impl LlmServices {
    pub fn new(client: LlmClient, prompts: PromptBuilder, temperatures: ServiceTemperatures) -> Self {
        Self {
            client,
            prompts,
            temperatures,
            retry_count: 3,
            backoff_base_ms: 1000,
            min_interval: None,
            next_slot: Mutex::new(None),
        }
    }

    /// Build the services for the active provider of `config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_client(LlmClient::from_config(&config.translation), config)
    }

    /// Use an explicit client with the languages and tuning of `config`
    pub fn with_client(client: LlmClient, config: &Config) -> Self {
        let common = &config.translation.common;
        let prompts = PromptBuilder::new(
            language_utils::prompt_language_name(&config.source_language),
            language_utils::prompt_language_name(&config.target_language),
        );
        let temperatures = ServiceTemperatures {
            translate: common.translate_temperature,
            critique: common.critique_temperature,
            repair: common.repair_temperature,
            terminology: common.terminology_temperature,
        };
        // the in-process mock is not subject to the hosted provider's quota
        let rate_limit = match client {
            LlmClient::Mock(_) => None,
            _ => config.translation.get_rate_limit(),
        };
        Self::new(client, prompts, temperatures)
            .with_retry(common.retry_count, common.retry_backoff_ms)
            .with_rate_limit(rate_limit)
    }

    pub fn with_retry(mut self, retry_count: u32, backoff_base_ms: u64) -> Self {
        self.retry_count = retry_count;
        self.backoff_base_ms = backoff_base_ms;
        self
    }

    /// Limit requests to `requests_per_minute`; `None` or zero disables the limit
    pub fn with_rate_limit(mut self, requests_per_minute: Option<u32>) -> Self {
        self.min_interval = requests_per_minute
            .filter(|&rpm| rpm > 0)
            .map(|rpm| Duration::from_millis(60_000 / rpm as u64));
        self
    }

    pub fn client(&self) -> &LlmClient {
        &self.client
    }

    /// Send a prompt, retrying transient failures
    async fn chat_with_retry(&self, prompt: &ChatPrompt) -> Result<String, ProviderError> {
        let mut attempt = 0;
        loop {
            self.wait_for_slot().await;
            match self.client.chat(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt < self.retry_count => {
                    attempt += 1;
                    let backoff_ms = self.backoff_base_ms * (1u64 << (attempt - 1));
                    warn!(
                        "{} request failed: {} - attempt {}/{}, retrying in {}ms",
                        self.client.name(),
                        e,
                        attempt,
                        self.retry_count + 1,
                        backoff_ms
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                }
                Err(e) => {
                    error!("{} request failed: {}", self.client.name(), e);
                    return Err(e);
                }
            }
        }
    }

    /// Reserve the next request slot and sleep until it opens
    async fn wait_for_slot(&self) {
        let Some(interval) = self.min_interval else {
            return;
        };
        let slot = {
            let mut next_slot = self.next_slot.lock();
            let now = Instant::now();
            let slot = next_slot.map_or(now, |next| next.max(now));
            *next_slot = Some(slot + interval);
            slot
        };
        tokio::time::sleep_until(slot).await;
    }

    /// Build the glossary from the abstract; never fails
    pub async fn generate_terminology(&self, abstract_text: &str) -> TerminologyMap {
        if abstract_text.trim().is_empty() {
            return TerminologyMap::new();
        }
        let prompt = self.prompts.terminology(abstract_text, self.temperatures.terminology);
        match self.chat_with_retry(&prompt).await {
            Ok(response) => {
                let terms = parse_terminology_response(&response);
                debug!("Extracted {} terminology entries", terms.len());
                terms
            }
            Err(e) => {
                warn!("Terminology extraction failed, continuing without glossary: {}", e);
                TerminologyMap::new()
            }
        }
    }
}

#[async_trait]
impl ChunkServices for LlmServices {
    async fn translate(&self, chunk: &str, terminology: &TerminologyMap) -> Result<String, TranslationError> {
        let prompt = self.prompts.translate(chunk, terminology, self.temperatures.translate);
        let response = self.chat_with_retry(&prompt).await?;
        Ok(strip_code_fence(&response).to_string())
    }

    async fn critique(&self, original: &str, translated: &str) -> Result<CritiqueVerdict, TranslationError> {
        let prompt = self.prompts.critique(original, translated, self.temperatures.critique);
        let response = self.chat_with_retry(&prompt).await?;
        parse_critique_response(&response)
    }

    async fn repair(
        &self,
        original: &str,
        failed: &str,
        errors: &[String],
        terminology: &TerminologyMap,
    ) -> Result<String, TranslationError> {
        let prompt = self.prompts.repair(original, failed, errors, terminology, self.temperatures.repair);
        let response = self.chat_with_retry(&prompt).await?;
        Ok(strip_code_fence(&response).to_string())
    }
}
