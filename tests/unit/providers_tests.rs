/*!
 * Tests for provider clients and the provider-backed chunk services
 */

use paperglot::app_config::{Config, TranslationConfig, TranslationProvider};
use paperglot::errors::TranslationError;
use paperglot::providers::mock::{MockProvider, MockRequest};
use paperglot::providers::{ChatPrompt, LlmClient};
use paperglot::translation::{ChunkServices, LlmServices, TerminologyMap};

use crate::common::cooperative_provider;

fn services(provider: MockProvider) -> LlmServices {
    LlmServices::with_client(LlmClient::Mock(provider), &Config::default()).with_retry(2, 1)
}

#[test]
fn test_fromConfig_shouldPickClientForActiveProvider() {
    let mut config = TranslationConfig::default();
    for (provider, name) in [
        (TranslationProvider::OpenAI, "OpenAI"),
        (TranslationProvider::Anthropic, "Anthropic"),
        (TranslationProvider::Ollama, "Ollama"),
    ] {
        config.provider = provider;
        assert_eq!(LlmClient::from_config(&config).name(), name);
    }
}

#[test]
fn test_testConnection_failingMock_shouldReportOutage() {
    let client = LlmClient::Mock(MockProvider::failing());

    let result = tokio_test::block_on(async { client.test_connection().await });

    assert!(result.is_err());
}

#[tokio::test]
async fn test_chat_mockClient_shouldCountRequestsAcrossClones() {
    let provider = MockProvider::working();
    let client = LlmClient::Mock(provider.clone());

    client.chat(&ChatPrompt::new("sys", "one", 0.0)).await.unwrap();
    client.chat(&ChatPrompt::new("sys", "two", 0.0)).await.unwrap();

    assert_eq!(provider.request_count(), 2);
}

#[tokio::test]
async fn test_translate_fencedAnswer_shouldReturnBareText() {
    let provider = MockProvider::working().with_custom_response(|_| "```latex\n你好 [MASK_MATH_0000]\n```".to_string());

    let text = services(provider).translate("Hello [MASK_MATH_0000]", &TerminologyMap::new()).await.unwrap();

    assert_eq!(text.trim(), "你好 [MASK_MATH_0000]");
}

#[tokio::test]
async fn test_translate_shouldUseConfiguredTemperature() {
    let provider = MockProvider::working().with_custom_response(|request: &MockRequest| request.temperature.to_string());

    let text = services(provider).translate("Hello", &TerminologyMap::new()).await.unwrap();

    assert_eq!(text, "0.3");
}

#[tokio::test]
async fn test_critique_cooperativeModel_shouldPass() {
    let verdict = services(cooperative_provider()).critique("Hello", "你好").await.unwrap();
    assert!(verdict.passed());
}

#[tokio::test]
async fn test_critique_proseAnswer_shouldBeMalformed() {
    let provider = MockProvider::working().with_custom_response(|_| "Looks fine to me.".to_string());

    let result = services(provider).critique("Hello", "你好").await;

    assert!(matches!(result, Err(TranslationError::MalformedCritique(_))));
}

#[tokio::test]
async fn test_repair_shouldSendErrorsToModel() {
    let provider = MockProvider::working().with_custom_response(|request: &MockRequest| {
        if request.prompt.contains("\"missing [MASK_MATH_0000]\"") {
            "fixed".to_string()
        } else {
            "unexpected".to_string()
        }
    });

    let text = services(provider)
        .repair("Hello", "你好", &["missing [MASK_MATH_0000]".to_string()], &TerminologyMap::new())
        .await
        .unwrap();

    assert_eq!(text, "fixed");
}

#[tokio::test]
async fn test_translate_persistentServerError_shouldGiveUpAfterRetries() {
    let provider = MockProvider::failing();

    let result = services(provider.clone()).translate("Hello", &TerminologyMap::new()).await;

    assert!(matches!(result, Err(TranslationError::Provider(_))));
    assert_eq!(provider.request_count(), 3);
}

#[tokio::test]
async fn test_translate_intermittentFailure_shouldRecover() {
    let provider = MockProvider::intermittent(2).with_custom_response(|_| "ok".to_string());
    let services = services(provider.clone());

    for _ in 0..3 {
        assert_eq!(services.translate("Hello", &TerminologyMap::new()).await.unwrap(), "ok");
    }
    // every second request fails once and is retried
    assert_eq!(provider.request_count(), 5);
}

#[tokio::test]
async fn test_generateTerminology_fencedJson_shouldParseTerms() {
    let terms = services(cooperative_provider())
        .generate_terminology("We study sparse attention.")
        .await;

    assert_eq!(terms.get("sparse attention"), Some("稀疏注意力"));
}
