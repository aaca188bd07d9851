use anyhow::{anyhow, Context, Result};
use log::{LevelFilter, warn};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use url::Url;

use crate::latex::rules::{
    DEFAULT_ATOMIC_MACROS, DEFAULT_CODE_ENVIRONMENTS, DEFAULT_MATH_ENVIRONMENTS, DEFAULT_OPAQUE_ENVIRONMENTS,
    DEFAULT_TRANSPARENT_ENVIRONMENTS,
};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    /// Source language code (ISO)
    #[serde(default = "default_source_language")]
    pub source_language: String,

    /// Target language code (ISO)
    #[serde(default = "default_target_language")]
    pub target_language: String,

    /// Translation config
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Per-chunk pipeline settings
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// Structural masking rule sets
    #[serde(default)]
    pub masking: MaskingSettings,

    /// Document compilation settings
    #[serde(default)]
    pub compile: CompileSettings,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Translation provider type
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationProvider {
    // @provider: Ollama
    Ollama,
    // @provider: OpenAI (and any OpenAI-compatible endpoint)
    #[default]
    OpenAI,
    // @provider: Anthropic
    Anthropic,
    // @provider: LM Studio (OpenAI-compatible local server)
    LMStudio,
}

impl TranslationProvider {
    // @returns: Capitalized provider name
    pub fn display_name(&self) -> &str {
        match self {
            Self::Ollama => "Ollama",
            Self::OpenAI => "OpenAI",
            Self::Anthropic => "Anthropic",
            Self::LMStudio => "LM Studio",
        }
    }

    // @returns: Lowercase provider identifier
    pub fn to_lowercase_string(&self) -> String {
        match self {
            Self::Ollama => "ollama".to_string(),
            Self::OpenAI => "openai".to_string(),
            Self::Anthropic => "anthropic".to_string(),
            Self::LMStudio => "lmstudio".to_string(),
        }
    }

    /// Hosted providers refuse requests without a key
    pub fn requires_api_key(&self) -> bool {
        matches!(self, Self::OpenAI | Self::Anthropic)
    }
}

impl std::fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_lowercase_string())
    }
}

impl std::str::FromStr for TranslationProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "lmstudio" => Ok(Self::LMStudio),
            _ => Err(anyhow!("Invalid provider type: {}", s)),
        }
    }
}

/// Provider configuration wrapper
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProviderConfig {
    // @field: Provider type identifier
    #[serde(rename = "type")]
    pub provider_type: String,

    // @field: Model name
    #[serde(default = "String::new")]
    pub model: String,

    // @field: API key
    #[serde(default = "String::new")]
    pub api_key: String,

    // @field: Service URL
    #[serde(default = "String::new")]
    pub endpoint: String,

    // @field: HTTP timeout seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    // @field: Max tokens per completion
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    // @field: Rate limit (requests per minute)
    #[serde(default)]
    pub rate_limit: Option<u32>,
}

impl ProviderConfig {
    // @param provider_type: Provider enum
    // @returns: Provider config with defaults
    pub fn new(provider_type: TranslationProvider) -> Self {
        let (model, endpoint, rate_limit) = match provider_type {
            TranslationProvider::Ollama => (default_ollama_model(), default_ollama_endpoint(), None),
            TranslationProvider::OpenAI => (default_openai_model(), default_openai_endpoint(), Some(60)),
            TranslationProvider::Anthropic => (default_anthropic_model(), default_anthropic_endpoint(), Some(45)),
            TranslationProvider::LMStudio => (default_lmstudio_model(), default_lmstudio_endpoint(), None),
        };
        Self {
            provider_type: provider_type.to_lowercase_string(),
            model,
            api_key: String::new(),
            endpoint,
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
            rate_limit,
        }
    }
}

/// Translation service configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationConfig {
    /// Translation provider to use
    #[serde(default)]
    pub provider: TranslationProvider,

    /// Available translation providers
    #[serde(default)]
    pub available_providers: Vec<ProviderConfig>,

    /// Common translation settings
    #[serde(default)]
    pub common: TranslationCommonConfig,
}

/// Settings shared by every provider
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TranslationCommonConfig {
    /// Transport retries for transient provider failures
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base backoff in milliseconds, doubled on each retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_translate_temperature")]
    pub translate_temperature: f32,

    #[serde(default = "default_critique_temperature")]
    pub critique_temperature: f32,

    #[serde(default = "default_repair_temperature")]
    pub repair_temperature: f32,

    #[serde(default = "default_terminology_temperature")]
    pub terminology_temperature: f32,
}

impl Default for TranslationCommonConfig {
    fn default() -> Self {
        Self {
            retry_count: default_retry_count(),
            retry_backoff_ms: default_retry_backoff_ms(),
            translate_temperature: default_translate_temperature(),
            critique_temperature: default_critique_temperature(),
            repair_temperature: default_repair_temperature(),
            terminology_temperature: default_terminology_temperature(),
        }
    }
}

/// Per-chunk translation pipeline settings
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PipelineSettings {
    /// Soft size limit of one chunk, in characters
    #[serde(default = "default_max_chunk_chars")]
    pub max_chunk_chars: usize,

    /// Repair attempts before a chunk falls back to its source text
    #[serde(default = "default_max_fix_attempts")]
    pub max_fix_attempts: u32,

    /// Chunks translated at the same time
    #[serde(default = "default_concurrent_chunks")]
    pub concurrent_chunks: usize,

    /// Budget for one translate, critique or repair call
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,

    /// Reject translations that lose, duplicate or invent mask tokens
    #[serde(default = "default_true")]
    pub enforce_mask_integrity: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_chunk_chars: default_max_chunk_chars(),
            max_fix_attempts: default_max_fix_attempts(),
            concurrent_chunks: default_concurrent_chunks(),
            call_timeout_secs: default_call_timeout_secs(),
            enforce_mask_integrity: true,
        }
    }
}

/// Name sets that drive structural masking
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MaskingSettings {
    #[serde(default = "default_atomic_macros")]
    pub atomic_macros: Vec<String>,

    #[serde(default = "default_opaque_environments")]
    pub opaque_environments: Vec<String>,

    #[serde(default = "default_code_environments")]
    pub code_environments: Vec<String>,

    #[serde(default = "default_math_environments")]
    pub math_environments: Vec<String>,

    /// Never opaque, starred or not
    #[serde(default = "default_transparent_environments")]
    pub transparent_environments: Vec<String>,
}

impl Default for MaskingSettings {
    fn default() -> Self {
        Self {
            atomic_macros: default_atomic_macros(),
            opaque_environments: default_opaque_environments(),
            code_environments: default_code_environments(),
            math_environments: default_math_environments(),
            transparent_environments: default_transparent_environments(),
        }
    }
}

/// Compilation of the translated project
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CompileSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Build driver invoked in the project directory
    #[serde(default = "default_engine_command")]
    pub engine_command: String,

    #[serde(default = "default_compile_timeout_secs")]
    pub timeout_secs: u64,

    /// Sanitize conflicting font packages and inject a CJK font block
    #[serde(default = "default_true")]
    pub cjk_fonts: bool,
}

impl Default for CompileSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            engine_command: default_engine_command(),
            timeout_secs: default_compile_timeout_secs(),
            cjk_fonts: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn default_source_language() -> String {
    "en".to_string()
}

fn default_target_language() -> String {
    "zh".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_tokens() -> u32 {
    8192
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    1000 // doubled on each retry
}

fn default_translate_temperature() -> f32 {
    0.3
}

fn default_critique_temperature() -> f32 {
    0.0
}

fn default_repair_temperature() -> f32 {
    0.2
}

fn default_terminology_temperature() -> f32 {
    0.0
}

fn default_max_chunk_chars() -> usize {
    4000
}

fn default_max_fix_attempts() -> u32 {
    3
}

fn default_concurrent_chunks() -> usize {
    4
}

fn default_call_timeout_secs() -> u64 {
    120
}

fn default_compile_timeout_secs() -> u64 {
    300
}

fn default_engine_command() -> String {
    "latexmk".to_string()
}

fn default_true() -> bool {
    true
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_atomic_macros() -> Vec<String> {
    to_strings(DEFAULT_ATOMIC_MACROS)
}

fn default_opaque_environments() -> Vec<String> {
    to_strings(DEFAULT_OPAQUE_ENVIRONMENTS)
}

fn default_code_environments() -> Vec<String> {
    to_strings(DEFAULT_CODE_ENVIRONMENTS)
}

fn default_math_environments() -> Vec<String> {
    to_strings(DEFAULT_MATH_ENVIRONMENTS)
}

fn default_transparent_environments() -> Vec<String> {
    to_strings(DEFAULT_TRANSPARENT_ENVIRONMENTS)
}

fn default_ollama_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_openai_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_anthropic_endpoint() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_lmstudio_endpoint() -> String {
    // LM Studio default server (OpenAI compatible) runs on port 1234 under /v1
    "http://localhost:1234/v1".to_string()
}

fn default_ollama_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_anthropic_model() -> String {
    "claude-3-5-sonnet-latest".to_string()
}

fn default_lmstudio_model() -> String {
    // Placeholder; users should set to the loaded model name in LM Studio
    "local-model".to_string()
}

/// Split an endpoint into host and port; a missing scheme means `http`
pub fn parse_endpoint(endpoint: &str) -> Result<(String, u16)> {
    let url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        Url::parse(endpoint)?
    } else {
        Url::parse(&format!("http://{}", endpoint))?
    };

    let host = url
        .host_str()
        .ok_or_else(|| anyhow!("Invalid host in endpoint: {}", endpoint))?
        .to_string();
    let port = url.port().unwrap_or(if url.scheme() == "https" { 443 } else { 80 });

    Ok((host, port))
}

impl Config {
    /// Load `path`, or write and return the defaults when it does not exist
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if path.exists() {
            let file = File::open(path).context(format!("Failed to open config file: {:?}", path))?;
            let reader = BufReader::new(file);
            let config: Config =
                serde_json::from_reader(reader).context(format!("Failed to parse config file: {:?}", path))?;
            Ok(config)
        } else {
            warn!("Config file not found at {:?}, creating default config.", path);
            let config = Config::default();
            let config_json =
                serde_json::to_string_pretty(&config).context("Failed to serialize default config to JSON")?;
            std::fs::write(path, config_json)
                .context(format!("Failed to write default config to file: {:?}", path))?;
            Ok(config)
        }
    }

    /// Apply `OPENAI_API_KEY`, `ANTHROPIC_API_KEY`, `OPENAI_BASE_URL` and `MODEL_NAME`
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
    }

    /// Same as [`Config::apply_env_overrides`] with an injectable lookup
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("OPENAI_API_KEY") {
            if let Some(p) = self.translation.provider_config_mut(&TranslationProvider::OpenAI) {
                if p.api_key.is_empty() {
                    p.api_key = key;
                }
            }
        }
        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            if let Some(p) = self.translation.provider_config_mut(&TranslationProvider::Anthropic) {
                if p.api_key.is_empty() {
                    p.api_key = key;
                }
            }
        }
        if let Some(url) = lookup("OPENAI_BASE_URL") {
            if let Some(p) = self.translation.provider_config_mut(&TranslationProvider::OpenAI) {
                p.endpoint = url;
            }
        }
        if let Some(model) = lookup("MODEL_NAME") {
            let active = self.translation.provider.clone();
            if let Some(p) = self.translation.provider_config_mut(&active) {
                p.model = model;
            }
        }
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        let _source_name = crate::language_utils::get_language_name(&self.source_language)?;
        let _target_name = crate::language_utils::get_language_name(&self.target_language)?;

        if self.pipeline.max_chunk_chars == 0 {
            return Err(anyhow!("pipeline.max_chunk_chars must be at least 1"));
        }
        if self.pipeline.concurrent_chunks == 0 {
            return Err(anyhow!("pipeline.concurrent_chunks must be at least 1"));
        }
        if self.pipeline.call_timeout_secs == 0 {
            return Err(anyhow!("pipeline.call_timeout_secs must be at least 1"));
        }

        let endpoint = self.translation.get_endpoint();
        parse_endpoint(&endpoint).context(format!("Invalid endpoint for {}", self.translation.provider.display_name()))?;

        if self.translation.provider.requires_api_key() && self.translation.get_api_key().is_empty() {
            return Err(anyhow!(
                "Translation API key is required for {} provider",
                self.translation.provider.display_name()
            ));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_language: default_source_language(),
            target_language: default_target_language(),
            translation: TranslationConfig::default(),
            pipeline: PipelineSettings::default(),
            masking: MaskingSettings::default(),
            compile: CompileSettings::default(),
            log_level: LogLevel::default(),
        }
    }
}

impl TranslationConfig {
    /// Get the active provider configuration from the available_providers array
    pub fn get_active_provider_config(&self) -> Option<&ProviderConfig> {
        self.get_provider_config(&self.provider)
    }

    /// Get a specific provider configuration by type
    pub fn get_provider_config(&self, provider_type: &TranslationProvider) -> Option<&ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        self.available_providers.iter().find(|p| p.provider_type == provider_str)
    }

    /// Mutable lookup, inserting a default entry when the provider is missing
    pub fn provider_config_mut(&mut self, provider_type: &TranslationProvider) -> Option<&mut ProviderConfig> {
        let provider_str = provider_type.to_lowercase_string();
        if !self.available_providers.iter().any(|p| p.provider_type == provider_str) {
            self.available_providers.push(ProviderConfig::new(provider_type.clone()));
        }
        self.available_providers.iter_mut().find(|p| p.provider_type == provider_str)
    }

    /// Get the model for the active provider
    pub fn get_model(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.model.is_empty() {
                return provider_config.model.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_model(),
            TranslationProvider::OpenAI => default_openai_model(),
            TranslationProvider::Anthropic => default_anthropic_model(),
            TranslationProvider::LMStudio => default_lmstudio_model(),
        }
    }

    /// Get the API key for the active provider
    pub fn get_api_key(&self) -> String {
        self.get_active_provider_config()
            .map(|p| p.api_key.clone())
            .unwrap_or_default()
    }

    /// Get the endpoint for the active provider
    pub fn get_endpoint(&self) -> String {
        if let Some(provider_config) = self.get_active_provider_config() {
            if !provider_config.endpoint.is_empty() {
                return provider_config.endpoint.clone();
            }
        }

        match self.provider {
            TranslationProvider::Ollama => default_ollama_endpoint(),
            TranslationProvider::OpenAI => default_openai_endpoint(),
            TranslationProvider::Anthropic => default_anthropic_endpoint(),
            TranslationProvider::LMStudio => default_lmstudio_endpoint(),
        }
    }

    pub fn get_timeout_secs(&self) -> u64 {
        self.get_active_provider_config()
            .map(|p| p.timeout_secs)
            .filter(|t| *t > 0)
            .unwrap_or_else(default_timeout_secs)
    }

    pub fn get_max_tokens(&self) -> u32 {
        self.get_active_provider_config()
            .map(|p| p.max_tokens)
            .filter(|t| *t > 0)
            .unwrap_or_else(default_max_tokens)
    }

    /// Get the rate limit for the active provider
    pub fn get_rate_limit(&self) -> Option<u32> {
        self.get_active_provider_config().and_then(|p| p.rate_limit)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            provider: TranslationProvider::default(),
            available_providers: vec![
                ProviderConfig::new(TranslationProvider::OpenAI),
                ProviderConfig::new(TranslationProvider::Anthropic),
                ProviderConfig::new(TranslationProvider::Ollama),
                ProviderConfig::new(TranslationProvider::LMStudio),
            ],
            common: TranslationCommonConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_shouldTargetChineseWithOpenAI() {
        let config = Config::default();
        assert_eq!(config.target_language, "zh");
        assert_eq!(config.translation.provider, TranslationProvider::OpenAI);
        assert_eq!(config.pipeline.max_fix_attempts, 3);
        assert_eq!(config.pipeline.max_chunk_chars, 4000);
        assert!(config.masking.code_environments.contains(&"lstlisting".to_string()));
    }

    #[test]
    fn test_deserialize_partialJson_shouldFillDefaults() {
        let json = r#"{"target_language": "ja", "pipeline": {"concurrent_chunks": 2}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        assert_eq!(config.source_language, "en");
        assert_eq!(config.target_language, "ja");
        assert_eq!(config.pipeline.concurrent_chunks, 2);
        assert_eq!(config.pipeline.max_chunk_chars, 4000);
        assert!(config.pipeline.enforce_mask_integrity);
        assert_eq!(config.compile.engine_command, "latexmk");
    }

    #[test]
    fn test_validate_hostedProviderWithoutKey_shouldFail() {
        let config = Config::default();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_localProvider_shouldPassWithoutKey() {
        let mut config = Config::default();
        config.translation.provider = TranslationProvider::Ollama;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zeroChunkSize_shouldFail() {
        let mut config = Config::default();
        config.translation.provider = TranslationProvider::Ollama;
        config.pipeline.max_chunk_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_applyOverridesFrom_shouldFillKeyEndpointAndModel() {
        let vars: HashMap<&str, &str> = [
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://proxy.local/v1"),
            ("MODEL_NAME", "gpt-4o-mini"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides_from(|name| vars.get(name).map(|v| v.to_string()));

        assert_eq!(config.translation.get_api_key(), "sk-test");
        assert_eq!(config.translation.get_endpoint(), "http://proxy.local/v1");
        assert_eq!(config.translation.get_model(), "gpt-4o-mini");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parseEndpoint_shouldDefaultSchemeAndPort() {
        assert_eq!(parse_endpoint("localhost:11434").unwrap(), ("localhost".to_string(), 11434));
        assert_eq!(parse_endpoint("https://api.openai.com/v1").unwrap(), ("api.openai.com".to_string(), 443));
        assert!(parse_endpoint("http://").is_err());
    }

    #[test]
    fn test_providerFromStr_shouldBeCaseInsensitive() {
        assert_eq!("Anthropic".parse::<TranslationProvider>().unwrap(), TranslationProvider::Anthropic);
        assert!("nope".parse::<TranslationProvider>().is_err());
    }
}
