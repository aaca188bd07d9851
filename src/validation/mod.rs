/*!
 * Validation of translated chunks.
 *
 * - `tokens`: mask token integrity between an original chunk and its translation
 */

pub mod tokens;

// Re-export main types
pub use tokens::{TokenValidationResult, TokenValidator};
