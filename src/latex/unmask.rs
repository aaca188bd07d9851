/*!
 * Reversal of masking.
 *
 * Tokens are substituted in a single pass over the recognised token syntax,
 * so a restored original can never be re-expanded. Tokens the table does not
 * know are left verbatim. Tokens that were issued but no longer appear in the
 * text are reported; their original content cannot be restored.
 */

use std::collections::HashSet;

use log::warn;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::latex::masker::MaskTable;

/// Any string with mask-token shape
pub static MASK_TOKEN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[MASK_[A-Z0-9_]+?_\d{4}\]").expect("Invalid mask token regex"));

/// Outcome of unmasking with bookkeeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmaskReport {
    pub text: String,
    /// Issued tokens absent from the input, in table order
    pub missing_tokens: Vec<String>,
    /// Token-shaped strings the table did not issue
    pub unknown_tokens: Vec<String>,
}

impl UnmaskReport {
    pub fn is_complete(&self) -> bool {
        self.missing_tokens.is_empty()
    }
}

/// Replace every known token in `text` with its original
pub fn unmask(text: &str, table: &MaskTable) -> String {
    unmask_with_report(text, table).text
}

/// Like [`unmask`], also listing missing and unknown tokens
pub fn unmask_with_report(text: &str, table: &MaskTable) -> UnmaskReport {
    if table.is_empty() {
        return UnmaskReport {
            text: text.to_string(),
            missing_tokens: Vec::new(),
            unknown_tokens: Vec::new(),
        };
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut unknown_tokens = Vec::new();

    let restored = MASK_TOKEN_REGEX.replace_all(text, |caps: &Captures| {
        let token = &caps[0];
        match table.get(token) {
            Some(original) => {
                seen.insert(token.to_string());
                original.to_string()
            }
            None => {
                unknown_tokens.push(token.to_string());
                token.to_string()
            }
        }
    });

    let missing_tokens: Vec<String> = table
        .tokens()
        .filter(|t| !seen.contains(*t))
        .map(str::to_string)
        .collect();

    if !missing_tokens.is_empty() {
        warn!(
            "{} masked span(s) missing from translated text, originals lost: {}",
            missing_tokens.len(),
            missing_tokens.join(", ")
        );
    }

    UnmaskReport {
        text: restored.into_owned(),
        missing_tokens,
        unknown_tokens,
    }
}
