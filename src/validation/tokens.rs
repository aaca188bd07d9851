/*!
 * Mask token validation for translated chunks.
 *
 * Every `[MASK_..._NNNN]` token of the original chunk must come back in the
 * translation exactly once, and no token may appear that the original did
 * not contain. The check is local and deterministic, so it backs up the
 * model-based critique.
 */

use log::debug;
use std::collections::BTreeMap;

use crate::latex::unmask::MASK_TOKEN_REGEX;

/// Token validation result
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenValidationResult {
    /// Tokens of the original absent from the translation
    pub missing_tokens: Vec<String>,
    /// Tokens of the original present more than once, with their count
    pub duplicated_tokens: Vec<(String, usize)>,
    /// Tokens in the translation that the original never had
    pub foreign_tokens: Vec<String>,
}

impl TokenValidationResult {
    /// Check if validation passed
    pub fn passed(&self) -> bool {
        self.missing_tokens.is_empty() && self.duplicated_tokens.is_empty() && self.foreign_tokens.is_empty()
    }

    /// Human-readable problems, in the shape the repair prompt expects
    pub fn to_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for token in &self.missing_tokens {
            errors.push(format!("Mask token {} is missing from the translation", token));
        }
        for (token, count) in &self.duplicated_tokens {
            errors.push(format!("Mask token {} appears {} times instead of once", token, count));
        }
        for token in &self.foreign_tokens {
            errors.push(format!("Mask token {} does not exist in the original", token));
        }
        errors
    }
}

/// Validator for mask tokens in translated chunks
pub struct TokenValidator;

impl TokenValidator {
    fn count_tokens(text: &str) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for m in MASK_TOKEN_REGEX.find_iter(text) {
            *counts.entry(m.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Compare the tokens of `original` and `translated`
    pub fn validate(original: &str, translated: &str) -> TokenValidationResult {
        let expected = Self::count_tokens(original);
        let found = Self::count_tokens(translated);

        let mut result = TokenValidationResult::default();
        for token in expected.keys() {
            match found.get(token) {
                None => result.missing_tokens.push(token.to_string()),
                Some(&count) if count > 1 => result.duplicated_tokens.push((token.to_string(), count)),
                Some(_) => {}
            }
        }
        result.foreign_tokens = found
            .keys()
            .filter(|token| !expected.contains_key(*token))
            .map(|token| token.to_string())
            .collect();

        debug!(
            "Token validation: expected={}, found={}, missing={}, foreign={}",
            expected.len(),
            found.len(),
            result.missing_tokens.len(),
            result.foreign_tokens.len()
        );

        result
    }
}
