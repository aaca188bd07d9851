/*!
 * Tests for the translate, critique and fix loop and its orchestration
 */

use std::time::Duration;

use paperglot::translation::pipeline::{CRITIC_FAILURE_ERROR, UNKNOWN_FAILURE_ERROR};
use paperglot::translation::{
    ChunkOutcome, ChunkPipeline, CritiqueVerdict, DocumentTranslator, PipelineConfig, TerminologyMap,
};

use crate::common::ScriptedServices;

fn config(max_fix_attempts: u32) -> PipelineConfig {
    PipelineConfig {
        max_fix_attempts,
        call_timeout: Duration::from_secs(5),
        enforce_mask_integrity: true,
    }
}

#[tokio::test]
async fn test_run_zeroFixBudget_shouldFallBackAfterOneCritique() {
    let services = ScriptedServices::translating("Bonjour.");
    let terms = TerminologyMap::new();

    let result = ChunkPipeline::new(&services, &terms, config(0)).run(0, "Hello.").await;

    assert_eq!(result.outcome, ChunkOutcome::ExhaustedFallback);
    assert_eq!(result.text, "Hello.");
    assert_eq!(*services.critique_calls.lock(), 1);
    assert_eq!(*services.repair_calls.lock(), 0);
}

#[tokio::test]
async fn test_run_exhaustedBudget_shouldReportLastCritiqueErrors() {
    let services = ScriptedServices::translating("Bonjour.").with_repair("Salut.");
    let terms = TerminologyMap::new();

    let result = ChunkPipeline::new(&services, &terms, config(3)).run(7, "Hello.").await;

    assert_eq!(result.outcome, ChunkOutcome::ExhaustedFallback);
    assert_eq!(result.fix_attempts, 3);
    assert_eq!(result.critiques, 4);
    assert_eq!(result.last_errors, vec!["scripted failure".to_string()]);
    assert_eq!(*services.translate_calls.lock(), 1);
}

#[tokio::test]
async fn test_run_failingRepair_shouldKeepPreviousCandidate() {
    let services = ScriptedServices::translating("Bonjour.").with_verdicts(vec![
        CritiqueVerdict::failing(vec!["tone".to_string()]),
        CritiqueVerdict::passing(),
    ]);
    let terms = TerminologyMap::new();

    let result = ChunkPipeline::new(&services, &terms, config(3)).run(0, "Hello.").await;

    assert_eq!(result.outcome, ChunkOutcome::Verified);
    assert_eq!(result.text, "Bonjour.");
    assert_eq!(result.fix_attempts, 1);
    assert_eq!(*services.repair_calls.lock(), 1);
}

#[tokio::test]
async fn test_run_failingVerdictWithoutReasons_shouldUseUnknownFailure() {
    let services = ScriptedServices::translating("Bonjour.").with_verdicts(vec![CritiqueVerdict::failing(Vec::new())]);
    let terms = TerminologyMap::new();

    let result = ChunkPipeline::new(&services, &terms, config(0)).run(0, "Hello.").await;

    assert_eq!(result.last_errors, vec![UNKNOWN_FAILURE_ERROR.to_string()]);
}

#[tokio::test]
async fn test_run_verifiedTranslation_shouldKeepTokensAndEdges() {
    let services = ScriptedServices::translating("Énergie [MASK_MATH_0000].")
        .with_verdicts(vec![CritiqueVerdict::passing()]);
    let terms = TerminologyMap::new();

    let result = ChunkPipeline::new(&services, &terms, config(3))
        .run(0, "Energy [MASK_MATH_0000].\n\n")
        .await;

    assert_eq!(result.outcome, ChunkOutcome::Verified);
    assert_eq!(result.text, "Énergie [MASK_MATH_0000].\n\n");
    assert!(result.last_errors.is_empty());
}

#[test]
fn test_criticFailureError_shouldNameTheFailure() {
    assert_eq!(CRITIC_FAILURE_ERROR, "Critic parsing failed");
}

#[tokio::test]
async fn test_translate_outage_shouldReturnDocumentUnchanged() {
    let services = ScriptedServices::default();
    let terms = TerminologyMap::new();
    let text = "First paragraph.\n\nSecond [MASK_CMD_CITE_0000].\n\n\n\nThird.\n";

    let translation = DocumentTranslator::new(&services, config(3), 20, 2).translate(text, &terms).await;

    assert_eq!(translation.text, text);
    assert_eq!(translation.stats.service_fallbacks, translation.stats.total_chunks - translation.stats.skipped);
    assert_eq!(translation.stats.verified, 0);
    assert!(translation.reports.iter().all(|r| r.outcome != ChunkOutcome::Verified));
}

#[tokio::test]
async fn test_translate_reports_shouldBeOrderedByChunkIndex() {
    let services = ScriptedServices::translating("Traduit.");
    let terms = TerminologyMap::new();
    let text = "One.\n\nTwo.\n\nThree.\n\nFour.";

    let translation = DocumentTranslator::new(&services, config(0), 1, 4).translate(text, &terms).await;

    let indices: Vec<usize> = translation.reports.iter().map(|r| r.index).collect();
    let expected: Vec<usize> = (0..translation.reports.len()).collect();
    assert_eq!(indices, expected);
    assert_eq!(translation.stats.exhausted_fallbacks, translation.stats.fallbacks());
}
