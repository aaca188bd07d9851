/*!
 * Bounded translate, critique and fix loop for one chunk.
 *
 * The pipeline is a finite-state machine:
 *
 * ```text
 * Translating -> Critiquing -> Done
 *                    |  ^
 *                    v  |
 *                   Fixing -> Done (attempts exhausted)
 * ```
 *
 * `Fixing` always returns to `Critiquing` unless the repair budget is spent,
 * so a chunk sees at most `max_fix_attempts + 1` critiques. Every service
 * failure degrades to a fallback instead of propagating: the caller always
 * gets text back.
 */

use log::{debug, error, info, warn};
use std::future::Future;
use std::time::Duration;

use crate::app_config::PipelineSettings;
use crate::errors::{ProviderError, TranslationError};
use crate::translation::services::ChunkServices;
use crate::translation::terminology::TerminologyMap;
use crate::validation::tokens::TokenValidator;

/// Error recorded when the verifier cannot be used
pub const CRITIC_FAILURE_ERROR: &str = "Critic parsing failed";

/// Error recorded when a failing verdict lists no reason
pub const UNKNOWN_FAILURE_ERROR: &str = "Unknown failure";

/// How a chunk left the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// A candidate passed critique
    Verified,
    /// Whitespace-only chunk, never sent to a service
    Skipped,
    /// Translation service unavailable; original kept
    ServiceFallback,
    /// Repair budget exhausted; original kept
    ExhaustedFallback,
}

impl ChunkOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::ServiceFallback | Self::ExhaustedFallback)
    }
}

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Translating,
    Critiquing,
    Fixing,
    Done(ChunkOutcome),
}

/// Working record of one chunk while it is in the pipeline
#[derive(Debug, Clone)]
pub struct TranslationState {
    pub original_chunk: String,
    pub translated_chunk: String,
    /// Repair attempts started so far
    pub attempt_count: u32,
    pub pending_errors: Vec<String>,
}

impl TranslationState {
    fn new(original: &str) -> Self {
        Self {
            original_chunk: original.to_string(),
            translated_chunk: String::new(),
            attempt_count: 0,
            pending_errors: Vec::new(),
        }
    }

    fn revert(&mut self) {
        self.translated_chunk = self.original_chunk.clone();
    }
}

/// Final result for one chunk
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkResult {
    pub text: String,
    pub outcome: ChunkOutcome,
    /// Repairs attempted
    pub fix_attempts: u32,
    /// Critiques performed
    pub critiques: u32,
    /// Errors from the last failing critique or service error
    pub last_errors: Vec<String>,
}

impl ChunkResult {
    /// Result for a chunk that bypasses the services
    pub fn skipped(text: &str) -> Self {
        Self {
            text: text.to_string(),
            outcome: ChunkOutcome::Skipped,
            fix_attempts: 0,
            critiques: 0,
            last_errors: Vec::new(),
        }
    }
}

/// Pipeline tuning
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_fix_attempts: u32,
    /// Budget for every single service call
    pub call_timeout: Duration,
    /// Check tokens locally after a passing critique
    pub enforce_mask_integrity: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&PipelineSettings::default())
    }
}

impl From<&PipelineSettings> for PipelineConfig {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            max_fix_attempts: settings.max_fix_attempts,
            call_timeout: Duration::from_secs(settings.call_timeout_secs),
            enforce_mask_integrity: settings.enforce_mask_integrity,
        }
    }
}

/// Keep the original's leading and trailing whitespace around a translation
///
/// Chunk edges carry paragraph breaks; models tend to trim them.
fn restore_edges(original: &str, translated: &str) -> String {
    let leading = &original[..original.len() - original.trim_start().len()];
    let trailing = &original[original.trim_end().len()..];
    let core = translated.trim();
    let mut text = String::with_capacity(leading.len() + core.len() + trailing.len());
    text.push_str(leading);
    text.push_str(core);
    text.push_str(trailing);
    text
}

/// Runs the state machine for chunks of one document
pub struct ChunkPipeline<'a, S: ChunkServices + ?Sized> {
    services: &'a S,
    terminology: &'a TerminologyMap,
    config: PipelineConfig,
}

impl<'a, S: ChunkServices + ?Sized> ChunkPipeline<'a, S> {
    pub fn new(services: &'a S, terminology: &'a TerminologyMap, config: PipelineConfig) -> Self {
        Self {
            services,
            terminology,
            config,
        }
    }

    /// Apply the per-call time budget
    async fn call<T, F>(&self, future: F) -> Result<T, TranslationError>
    where
        F: Future<Output = Result<T, TranslationError>>,
    {
        match tokio::time::timeout(self.config.call_timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(self.config.call_timeout).into()),
        }
    }

    /// Translate one chunk; never fails
    pub async fn run(&self, index: usize, chunk: &str) -> ChunkResult {
        let mut state = TranslationState::new(chunk);
        let mut current = PipelineState::Translating;
        let mut critiques = 0;
        let mut last_errors = Vec::new();

        let outcome = loop {
            current = match current {
                PipelineState::Translating => self.translate_step(index, &mut state, &mut last_errors).await,
                PipelineState::Critiquing => {
                    critiques += 1;
                    let next = self.critique_step(index, &mut state).await;
                    if !state.pending_errors.is_empty() {
                        last_errors = state.pending_errors.clone();
                    }
                    next
                }
                PipelineState::Fixing => self.fix_step(index, &mut state).await,
                PipelineState::Done(outcome) => break outcome,
            };
        };

        let text = match outcome {
            ChunkOutcome::Verified => restore_edges(&state.original_chunk, &state.translated_chunk),
            _ => state.original_chunk,
        };

        ChunkResult {
            text,
            outcome,
            fix_attempts: state.attempt_count.min(self.config.max_fix_attempts),
            critiques,
            last_errors,
        }
    }

    async fn translate_step(
        &self,
        index: usize,
        state: &mut TranslationState,
        last_errors: &mut Vec<String>,
    ) -> PipelineState {
        match self.call(self.services.translate(&state.original_chunk, self.terminology)).await {
            Ok(translated) => {
                state.translated_chunk = translated;
                PipelineState::Critiquing
            }
            Err(e) => {
                error!("Chunk {}: translation failed, keeping original text: {}", index, e);
                state.revert();
                last_errors.push(e.to_string());
                PipelineState::Done(ChunkOutcome::ServiceFallback)
            }
        }
    }

    async fn critique_step(&self, index: usize, state: &mut TranslationState) -> PipelineState {
        let verdict = self
            .call(self.services.critique(&state.original_chunk, &state.translated_chunk))
            .await;

        match verdict {
            Ok(verdict) if verdict.passed() => {
                if self.config.enforce_mask_integrity {
                    let check = TokenValidator::validate(&state.original_chunk, &state.translated_chunk);
                    if !check.passed() {
                        debug!("Chunk {}: critique passed but mask tokens differ", index);
                        state.pending_errors = check.to_errors();
                        return PipelineState::Fixing;
                    }
                }
                state.pending_errors.clear();
                PipelineState::Done(ChunkOutcome::Verified)
            }
            Ok(verdict) => {
                state.pending_errors = if verdict.errors.is_empty() {
                    vec![UNKNOWN_FAILURE_ERROR.to_string()]
                } else {
                    verdict.errors
                };
                debug!("Chunk {}: critique failed: {:?}", index, state.pending_errors);
                PipelineState::Fixing
            }
            Err(e) => {
                debug!("Chunk {}: critique unusable: {}", index, e);
                state.pending_errors = vec![format!("{}: {}", CRITIC_FAILURE_ERROR, e)];
                PipelineState::Fixing
            }
        }
    }

    async fn fix_step(&self, index: usize, state: &mut TranslationState) -> PipelineState {
        state.attempt_count += 1;
        if state.attempt_count > self.config.max_fix_attempts {
            warn!(
                "Chunk {}: still failing after {} fix attempts, keeping original text",
                index, self.config.max_fix_attempts
            );
            state.revert();
            state.pending_errors.clear();
            return PipelineState::Done(ChunkOutcome::ExhaustedFallback);
        }

        info!(
            "Chunk {}: fix attempt {}/{}",
            index, state.attempt_count, self.config.max_fix_attempts
        );
        let repaired = self
            .call(self.services.repair(
                &state.original_chunk,
                &state.translated_chunk,
                &state.pending_errors,
                self.terminology,
            ))
            .await;
        match repaired {
            Ok(text) => state.translated_chunk = text,
            Err(e) => warn!("Chunk {}: repair failed, keeping previous candidate: {}", index, e),
        }
        PipelineState::Critiquing
    }
}
