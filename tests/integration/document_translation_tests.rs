/*!
 * End-to-end translation of single LaTeX documents over a mock provider
 */

use std::time::Duration;

use paperglot::app_config::Config;
use paperglot::latex::{Masker, MaskingMode, mask};
use paperglot::providers::LlmClient;
use paperglot::providers::mock::{MockProvider, MockRequest};
use paperglot::translation::{DocumentTranslator, LlmServices, PipelineConfig, TerminologyMap};

use crate::common::{
    INTRO_TEX, METHOD_TEX, PREAMBLE_TEX, cooperative_answer, cooperative_provider, unsatisfiable_answer,
};

fn services(provider: MockProvider) -> LlmServices {
    LlmServices::with_client(LlmClient::Mock(provider), &Config::default()).with_retry(0, 1)
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        max_fix_attempts: 3,
        call_timeout: Duration::from_secs(5),
        enforce_mask_integrity: true,
    }
}

#[tokio::test]
async fn test_translateLatex_cooperativeModel_shouldTranslateProseAndKeepMarkup() {
    let services = services(cooperative_provider());
    let translator = DocumentTranslator::new(&services, pipeline_config(), 4000, 2);

    let result = translator
        .translate_latex(&Masker::default(), INTRO_TEX, &TerminologyMap::new())
        .await;

    assert_eq!(result.masking_mode, MaskingMode::Structural);
    assert!(result.missing_tokens.is_empty());
    assert!(result.text.starts_with("【译】"));
    for protected in ["$O(n^2)$", "\\cite{vaswani2017}", "\\ref{fig:overview}", "\\label{fig:overview}"] {
        assert!(result.text.contains(protected), "lost {}", protected);
    }
    assert_eq!(result.stats.verified, 1);
    assert_eq!(result.stats.fallbacks(), 0);
}

/// Cooperative, except that any reference key it sees gets rewritten
fn key_mangling_answer(request: &MockRequest) -> String {
    cooperative_answer(request).replace("knuth", "KNUTH").replace("tab:a", "TAB:A")
}

#[tokio::test]
async fn test_translateLatex_preambleDefinitions_shouldKeepReferencesAwayFromModel() {
    let services = services(MockProvider::working().with_custom_response(key_mangling_answer));
    let translator = DocumentTranslator::new(&services, pipeline_config(), 4000, 2);

    let result = translator
        .translate_latex(&Masker::default(), PREAMBLE_TEX, &TerminologyMap::new())
        .await;

    assert_eq!(result.masking_mode, MaskingMode::Structural);
    assert!(result.missing_tokens.is_empty());
    for protected in ["\\newcommand{\\eeq}{\\end{equation}}", "\\cite{knuth}", "\\ref{tab:a}"] {
        assert!(result.text.contains(protected), "lost {}", protected);
    }
    assert_eq!(result.stats.verified, 1);
}

#[tokio::test]
async fn test_translateLatex_smallChunks_shouldKeepEveryMaskedSpan() {
    let services = services(cooperative_provider());
    let translator = DocumentTranslator::new(&services, pipeline_config(), 48, 3);
    let masked = mask(METHOD_TEX);

    let result = translator
        .translate_latex(&Masker::default(), METHOD_TEX, &TerminologyMap::new())
        .await;

    assert!(result.stats.total_chunks > 1);
    assert_eq!(result.text.matches("【译】").count(), result.stats.verified);
    for entry in masked.table.iter() {
        assert!(result.text.contains(&entry.original), "lost {}", entry.token);
    }
}

#[tokio::test]
async fn test_translateLatex_unsatisfiableCritic_shouldReturnSourceUnchanged() {
    let provider = MockProvider::working().with_custom_response(unsatisfiable_answer);
    let services = services(provider.clone());
    let translator = DocumentTranslator::new(&services, pipeline_config(), 4000, 1);

    let result = translator
        .translate_latex(&Masker::default(), METHOD_TEX, &TerminologyMap::new())
        .await;

    assert_eq!(result.text, METHOD_TEX);
    assert_eq!(result.stats.exhausted_fallbacks, 1);
    // one translation, four critiques and three repairs
    assert_eq!(provider.request_count(), 8);
}

#[tokio::test]
async fn test_translateLatex_providerDown_shouldReturnSourceUnchanged() {
    let services = services(MockProvider::failing());
    let translator = DocumentTranslator::new(&services, pipeline_config(), 64, 4);

    let result = translator
        .translate_latex(&Masker::default(), INTRO_TEX, &TerminologyMap::new())
        .await;

    assert_eq!(result.text, INTRO_TEX);
    assert_eq!(result.stats.verified, 0);
    assert_eq!(result.stats.service_fallbacks, result.stats.total_chunks - result.stats.skipped);
}

#[tokio::test]
async fn test_translateLatex_slowProvider_shouldTimeOutPerCall() {
    let services = services(MockProvider::slow(500));
    let config = PipelineConfig {
        call_timeout: Duration::from_millis(50),
        ..pipeline_config()
    };
    let translator = DocumentTranslator::new(&services, config, 4000, 1);

    let result = translator
        .translate_latex(&Masker::default(), "A short paragraph.\n", &TerminologyMap::new())
        .await;

    assert_eq!(result.text, "A short paragraph.\n");
    assert_eq!(result.stats.service_fallbacks, 1);
}

#[tokio::test]
async fn test_translateLatex_malformedSource_shouldStillProtectMath() {
    let services = services(cooperative_provider());
    let translator = DocumentTranslator::new(&services, pipeline_config(), 4000, 1);
    let source = "Unbalanced } brace near $x^2$ in prose.\n";

    let result = translator
        .translate_latex(&Masker::default(), source, &TerminologyMap::new())
        .await;

    assert_eq!(result.masking_mode, MaskingMode::Fallback);
    assert_eq!(result.masked_spans, 1);
    assert_eq!(result.text, "【译】Unbalanced } brace near $x^2$ in prose.\n");
}
