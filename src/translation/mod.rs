/*!
 * Translation of masked LaTeX text using AI providers.
 *
 * - `segmenter`: paragraph-boundary chunking
 * - `terminology`: document glossary
 * - `prompts`: instruction templates for every service
 * - `services`: the service boundary and its provider-backed implementation
 * - `pipeline`: bounded translate, critique and fix loop per chunk
 * - `orchestrator`: concurrent chunk execution and ordered reassembly
 */

pub mod orchestrator;
pub mod pipeline;
pub mod prompts;
pub mod segmenter;
pub mod services;
pub mod terminology;

// Re-export main types for easier usage
pub use self::orchestrator::{ChunkReport, DocumentTranslation, DocumentTranslator, LatexTranslation, PipelineStats};
pub use self::pipeline::{ChunkOutcome, ChunkPipeline, ChunkResult, PipelineConfig, PipelineState, TranslationState};
pub use self::prompts::PromptBuilder;
pub use self::segmenter::{DocumentChunk, segment};
pub use self::services::{ChunkServices, CritiqueVerdict, LlmServices};
pub use self::terminology::TerminologyMap;
