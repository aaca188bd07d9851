/*!
 * LaTeX project handling around the translation core.
 *
 * - `walker`: main file discovery and include-following traversal
 * - `compiler`: font sanitizing, CJK font injection and `latexmk` runs
 */

pub mod compiler;
pub mod walker;

pub use compiler::{CompileOutcome, Compiler, inject_fonts, sanitize_project};
pub use walker::{find_main_tex, include_order, resolve_include, walk};
