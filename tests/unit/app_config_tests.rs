/*!
 * Tests for configuration loading, overrides and validation
 */

use anyhow::Result;
use std::fs;

use paperglot::app_config::{Config, TranslationProvider};
use paperglot::latex::{MaskingRules, Masker};

use crate::common::{create_temp_dir, create_test_file};

#[test]
fn test_loadOrCreate_missingFile_shouldWriteDefaults() -> Result<()> {
    let dir = create_temp_dir()?;
    let path = dir.path().join("conf.json");

    let config = Config::load_or_create(&path)?;

    assert!(path.exists());
    assert_eq!(config.target_language, "zh");
    let reloaded = Config::load_or_create(&path)?;
    assert_eq!(reloaded.pipeline.max_fix_attempts, config.pipeline.max_fix_attempts);
    assert_eq!(reloaded.masking.atomic_macros, config.masking.atomic_macros);
    Ok(())
}

#[test]
fn test_loadOrCreate_existingFile_shouldKeepUserValues() -> Result<()> {
    let dir = create_temp_dir()?;
    let path = create_test_file(
        dir.path(),
        "conf.json",
        r#"{
            "target_language": "fr",
            "translation": {"provider": "ollama"},
            "compile": {"enabled": false},
            "masking": {"atomic_macros": ["cite", "acro"]}
        }"#,
    )?;

    let config = Config::load_or_create(&path)?;

    assert_eq!(config.target_language, "fr");
    assert_eq!(config.translation.provider, TranslationProvider::Ollama);
    assert!(!config.compile.enabled);
    assert!(config.compile.cjk_fonts);
    assert_eq!(config.masking.atomic_macros, vec!["cite".to_string(), "acro".to_string()]);
    assert!(config.validate().is_ok());
    Ok(())
}

#[test]
fn test_loadOrCreate_invalidJson_shouldFail() -> Result<()> {
    let dir = create_temp_dir()?;
    let path = create_test_file(dir.path(), "conf.json", "{ not json")?;

    assert!(Config::load_or_create(&path).is_err());
    assert_eq!(fs::read_to_string(&path)?, "{ not json");
    Ok(())
}

#[test]
fn test_validate_unknownTargetLanguage_shouldFail() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Ollama;
    config.target_language = "xx-nope".to_string();

    assert!(config.validate().is_err());
}

#[test]
fn test_validate_zeroConcurrency_shouldFail() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Ollama;
    config.pipeline.concurrent_chunks = 0;

    assert!(config.validate().is_err());
}

#[test]
fn test_applyOverridesFrom_shouldNotReplaceConfiguredKey() {
    let mut config = Config::default();
    config.translation.provider = TranslationProvider::Anthropic;
    if let Some(provider) = config.translation.provider_config_mut(&TranslationProvider::Anthropic) {
        provider.api_key = "from-file".to_string();
    }

    config.apply_overrides_from(|name| match name {
        "ANTHROPIC_API_KEY" => Some("from-env".to_string()),
        _ => None,
    });

    assert_eq!(config.translation.get_api_key(), "from-file");
}

#[test]
fn test_maskingSettings_shouldDriveTheMasker() {
    let mut config = Config::default();
    config.masking.atomic_macros.retain(|name| name != "cite");

    let masker = Masker::new(MaskingRules::from(&config.masking));
    let doc = masker.mask("As shown in \\cite{a} and $x$.");

    assert!(doc.masked_text.contains("\\cite{a}"));
    assert_eq!(doc.table.len(), 1);
}
