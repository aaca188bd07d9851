/*!
 * Document-level driver of the chunk pipelines.
 *
 * Chunks are independent once the text is masked, so their pipelines run
 * concurrently. Results are reassembled strictly by chunk index.
 */

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::latex::masker::{MaskingMode, Masker};
use crate::latex::unmask::unmask_with_report;
use crate::translation::pipeline::{ChunkOutcome, ChunkPipeline, ChunkResult, PipelineConfig};
use crate::translation::segmenter::{DocumentChunk, segment};
use crate::translation::services::ChunkServices;
use crate::translation::terminology::TerminologyMap;

/// Per-chunk record of one run
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkReport {
    pub index: usize,
    pub outcome: ChunkOutcome,
    pub fix_attempts: u32,
    pub errors: Vec<String>,
}

/// Aggregated counters of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub total_chunks: usize,
    pub verified: usize,
    pub skipped: usize,
    pub service_fallbacks: usize,
    pub exhausted_fallbacks: usize,
    pub fix_attempts: u32,
    pub critiques: u32,
}

impl PipelineStats {
    fn record(&mut self, result: &ChunkResult) {
        self.total_chunks += 1;
        self.fix_attempts += result.fix_attempts;
        self.critiques += result.critiques;
        match result.outcome {
            ChunkOutcome::Verified => self.verified += 1,
            ChunkOutcome::Skipped => self.skipped += 1,
            ChunkOutcome::ServiceFallback => self.service_fallbacks += 1,
            ChunkOutcome::ExhaustedFallback => self.exhausted_fallbacks += 1,
        }
    }

    /// Chunks left untranslated because of a failure
    pub fn fallbacks(&self) -> usize {
        self.service_fallbacks + self.exhausted_fallbacks
    }

    pub fn merge(&mut self, other: &PipelineStats) {
        self.total_chunks += other.total_chunks;
        self.verified += other.verified;
        self.skipped += other.skipped;
        self.service_fallbacks += other.service_fallbacks;
        self.exhausted_fallbacks += other.exhausted_fallbacks;
        self.fix_attempts += other.fix_attempts;
        self.critiques += other.critiques;
    }

    /// One-line summary for logs
    pub fn summary(&self) -> String {
        format!(
            "{} chunks: {} verified, {} skipped, {} fallbacks ({} service, {} exhausted), {} fixes, {} critiques",
            self.total_chunks,
            self.verified,
            self.skipped,
            self.fallbacks(),
            self.service_fallbacks,
            self.exhausted_fallbacks,
            self.fix_attempts,
            self.critiques
        )
    }
}

/// Translated masked text plus bookkeeping
#[derive(Debug, Clone)]
pub struct DocumentTranslation {
    pub text: String,
    pub reports: Vec<ChunkReport>,
    pub stats: PipelineStats,
    pub duration: Duration,
}

/// Outcome of translating one LaTeX source end to end
#[derive(Debug, Clone)]
pub struct LatexTranslation {
    pub text: String,
    pub masking_mode: MaskingMode,
    pub masked_spans: usize,
    /// Tokens the translation lost; their original content is gone
    pub missing_tokens: Vec<String>,
    pub stats: PipelineStats,
}

/// Progress callback: (chunks done, chunks total)
pub type ProgressCallback = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Runs chunk pipelines concurrently and reassembles the document
pub struct DocumentTranslator<'a, S: ChunkServices + ?Sized> {
    services: &'a S,
    config: PipelineConfig,
    max_chunk_chars: usize,
    concurrent_chunks: usize,
    progress: Option<ProgressCallback>,
}

impl<'a, S: ChunkServices + ?Sized> DocumentTranslator<'a, S> {
    pub fn new(services: &'a S, config: PipelineConfig, max_chunk_chars: usize, concurrent_chunks: usize) -> Self {
        Self {
            services,
            config,
            max_chunk_chars: max_chunk_chars.max(1),
            concurrent_chunks: concurrent_chunks.max(1),
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Translate masked text chunk by chunk
    pub async fn translate(&self, masked_text: &str, terminology: &TerminologyMap) -> DocumentTranslation {
        let start = Instant::now();
        let chunks = segment(masked_text, self.max_chunk_chars);
        let total = chunks.len();
        debug!("Segmented {} chars into {} chunks", masked_text.len(), total);

        let pipeline = ChunkPipeline::new(self.services, terminology, self.config.clone());
        let stats = Mutex::new(PipelineStats::default());
        let done = Mutex::new(0usize);

        let run_chunk = |chunk: DocumentChunk| {
            let pipeline = &pipeline;
            let stats = &stats;
            let done = &done;
            async move {
                let result = if chunk.is_blank() {
                    ChunkResult::skipped(&chunk.text)
                } else {
                    pipeline.run(chunk.index, &chunk.text).await
                };

                stats.lock().record(&result);
                let finished = {
                    let mut done = done.lock();
                    *done += 1;
                    *done
                };
                if let Some(progress) = &self.progress {
                    progress(finished, total);
                }
                (chunk.index, result)
            }
        };

        let mut results: Vec<(usize, ChunkResult)> = stream::iter(chunks)
            .map(run_chunk)
            .buffer_unordered(self.concurrent_chunks)
            .collect()
            .await;

        // Emission order is a correctness contract
        results.sort_by_key(|(index, _)| *index);

        let mut text = String::with_capacity(masked_text.len());
        let mut reports = Vec::with_capacity(results.len());
        for (index, result) in results {
            text.push_str(&result.text);
            reports.push(ChunkReport {
                index,
                outcome: result.outcome,
                fix_attempts: result.fix_attempts,
                errors: result.last_errors,
            });
        }

        let stats = stats.into_inner();
        debug!("Translated document: {}", stats.summary());

        DocumentTranslation {
            text,
            reports,
            stats,
            duration: start.elapsed(),
        }
    }

    /// Mask, translate and unmask a LaTeX source
    pub async fn translate_latex(
        &self,
        masker: &Masker,
        source: &str,
        terminology: &TerminologyMap,
    ) -> LatexTranslation {
        let masked = masker.mask(source);
        info!(
            "Masked {} spans ({:?} mode), {} chars left to translate",
            masked.table.len(),
            masked.mode,
            masked.masked_text.len()
        );

        if masked.masked_text.trim().is_empty() {
            return LatexTranslation {
                text: source.to_string(),
                masking_mode: masked.mode,
                masked_spans: masked.table.len(),
                missing_tokens: Vec::new(),
                stats: PipelineStats::default(),
            };
        }

        let translation = self.translate(&masked.masked_text, terminology).await;
        let report = unmask_with_report(&translation.text, &masked.table);
        if !report.missing_tokens.is_empty() {
            warn!(
                "{} mask tokens were lost in translation; their content is missing from the output",
                report.missing_tokens.len()
            );
        }

        LatexTranslation {
            text: report.text,
            masking_mode: masked.mode,
            masked_spans: masked.table.len(),
            missing_tokens: report.missing_tokens,
            stats: translation.stats,
        }
    }
}
