/*!
 * LaTeX structure handling.
 *
 * - `node`: the document tree
 * - `parser`: strict walker building the tree
 * - `rules`: masking rule sets and node classification
 * - `masker`: token substitution with a math-only fallback
 * - `unmask`: token restoration
 * - `metadata`: title and abstract extraction
 */

pub mod masker;
pub mod metadata;
pub mod node;
pub mod parser;
pub mod rules;
pub mod unmask;

pub use masker::{MaskEntry, MaskSpan, MaskTable, MaskedDocument, Masker, MaskingMode, mask};
pub use metadata::{PaperMetadata, extract_metadata};
pub use node::{DocumentNode, Span};
pub use rules::{Classification, MaskingRules, classify};
pub use unmask::{UnmaskReport, unmask, unmask_with_report};
