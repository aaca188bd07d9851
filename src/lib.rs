/*!
 * # paperglot - LaTeX paper translation with AI
 *
 * A Rust library for translating LaTeX papers while keeping every
 * non-prose span intact.
 *
 * ## Features
 *
 * - Structure-aware masking of math, citations, references, tables and code
 *   with a math-only fallback for markup the parser rejects
 * - Paragraph-boundary chunking, lossless by construction
 * - Bounded translate, critique and fix loop per chunk
 * - Concurrent chunk translation with ordered reassembly
 * - Terminology extraction from the abstract
 * - Project handling: main file discovery, include traversal, CJK font setup
 *   and XeLaTeX compilation
 * - Translation with various AI providers:
 *   - Ollama (local LLM)
 *   - OpenAI API and compatible servers (LM Studio)
 *   - Anthropic API
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `latex`: document tree, masking rules, masking and unmasking
 * - `translation`: segmentation, services, the chunk pipeline and the orchestrator
 * - `validation`: mask token integrity checks
 * - `project`: traversal and compilation of LaTeX projects
 * - `providers`: Client implementations for various LLM providers
 * - `app_config`: Configuration management
 * - `app_controller`: Main application controller
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod latex;
pub mod project;
pub mod providers;
pub mod translation;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::{AppError, MaskingError, ProviderError, TranslationError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use latex::{MaskTable, MaskedDocument, Masker, mask, unmask};
pub use translation::{ChunkServices, DocumentTranslator, TerminologyMap, segment};
