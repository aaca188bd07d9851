/*!
 * Structural masking of LaTeX documents.
 *
 * The masker replaces every span that must survive translation untouched
 * (math, references, opaque environments, code bodies) with a token of the
 * form `[MASK_<TYPE>_<NNNN>]` and records the original text in a
 * [`MaskTable`]. Masking never fails: when the walker cannot build a tree the
 * masker falls back to a delimiter-only pass that protects math and nothing
 * else.
 *
 * Text that already looks like a mask token is masked too, under its own
 * token, so unmasking can never confuse it with a span this call issued.
 */

use std::collections::HashMap;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::errors::MaskingError;
use crate::latex::node::{DocumentNode, Span};
use crate::latex::parser;
use crate::latex::rules::{Classification, MaskingRules, classify};
use crate::latex::unmask::MASK_TOKEN_REGEX;

/// Type tag used by the delimiter-only fallback
pub const FALLBACK_MATH_TAG: &str = "R_MATH";

/// Type tag for token-shaped text found in the source itself
pub const LITERAL_TOKEN_TAG: &str = "LIT";

/// Math delimiters for the fallback pass; `\\.` consumes escapes like `\$`
static FALLBACK_MATH_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)(?P<math>\\\[(?:\\.|[^\\])*?\\\]|\\\((?:\\.|[^\\])*?\\\)|\$\$(?:\\.|[^\\$])*?\$\$|\$(?:\\.|[^\\$])+?\$)|\\.",
    )
    .expect("Invalid fallback math regex")
});

/// Build the token for the `counter`-th span of a masking call
pub fn format_token(tag: &str, counter: usize) -> String {
    format!("[MASK_{}_{:04}]", tag, counter)
}

/// Byte range of the source replaced by one token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskSpan {
    pub start: usize,
    pub end: usize,
    pub tag: String,
}

impl MaskSpan {
    fn new(span: Span, tag: impl Into<String>) -> Self {
        Self {
            start: span.start,
            end: span.end,
            tag: tag.into(),
        }
    }

    pub fn overlaps(&self, other: &MaskSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// One token and the text it stands for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskEntry {
    pub token: String,
    pub original: String,
    pub tag: String,
}

/// Ordered token table of one masking call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaskTable {
    entries: Vec<MaskEntry>,
    index: HashMap<String, usize>,
}

impl MaskTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, entry: MaskEntry) {
        self.index.insert(entry.token.clone(), self.entries.len());
        self.entries.push(entry);
    }

    /// Original text for `token`, if this table issued it
    pub fn get(&self, token: &str) -> Option<&str> {
        self.index.get(token).map(|&i| self.entries[i].original.as_str())
    }

    pub fn contains(&self, token: &str) -> bool {
        self.index.contains_key(token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in token-counter order
    pub fn iter(&self) -> impl Iterator<Item = &MaskEntry> {
        self.entries.iter()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.token.as_str())
    }
}

/// How the spans of a masking call were found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskingMode {
    /// Full tree walk with every rule applied
    Structural,
    /// Delimiter-only math masking after a parse failure
    Fallback,
}

/// Result of masking one document
#[derive(Debug, Clone)]
pub struct MaskedDocument {
    pub masked_text: String,
    pub table: MaskTable,
    pub spans: Vec<MaskSpan>,
    pub mode: MaskingMode,
}

/// Masker bound to one rule set
#[derive(Debug, Clone, Default)]
pub struct Masker {
    rules: MaskingRules,
}

impl Masker {
    pub fn new(rules: MaskingRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &MaskingRules {
        &self.rules
    }

    /// Mask `text`; falls back to delimiter-only masking on a parse error
    pub fn mask(&self, text: &str) -> MaskedDocument {
        let (spans, mode) = match self.structural_spans(text) {
            Ok(spans) => (spans, MaskingMode::Structural),
            Err(e) => {
                let (line, column) = line_and_column(text, error_position(&e));
                warn!(
                    "Structural parse failed at line {}, column {}, masking math delimiters only: {}",
                    line, column, e
                );
                (fallback_spans(text), MaskingMode::Fallback)
            }
        };
        let spans = with_literal_tokens(text, spans);

        let (masked_text, table) = apply_spans(text, &spans);
        debug!("Masked {} spans ({:?} mode) in {} bytes", table.len(), mode, text.len());

        MaskedDocument {
            masked_text,
            table,
            spans,
            mode,
        }
    }

    /// Spans found by the tree walk, in document order
    pub fn structural_spans(&self, text: &str) -> Result<Vec<MaskSpan>, MaskingError> {
        let nodes = parser::parse(text, &self.rules)?;
        let mut spans = Vec::new();
        for node in &nodes {
            self.collect(node, &mut spans);
        }
        Ok(spans)
    }

    fn collect(&self, node: &DocumentNode, spans: &mut Vec<MaskSpan>) {
        match classify(node, &self.rules) {
            Classification::Opaque(tag) => spans.push(MaskSpan::new(node.span(), tag)),
            Classification::CodeContent(tag) => {
                if let DocumentNode::Environment { children, .. } = node {
                    if let (Some(first), Some(last)) = (children.first(), children.last()) {
                        let body = Span::new(first.span().start, last.span().end);
                        if !body.is_empty() {
                            spans.push(MaskSpan::new(body, tag));
                        }
                    }
                }
            }
            Classification::Transparent => {
                for child in node.child_nodes() {
                    self.collect(child, spans);
                }
            }
        }
    }
}

/// Mask `text` with the default rule set
pub fn mask(text: &str) -> MaskedDocument {
    Masker::default().mask(text)
}

/// Delimiter-bounded math spans, found by pattern matching alone
pub fn fallback_spans(text: &str) -> Vec<MaskSpan> {
    FALLBACK_MATH_REGEX
        .captures_iter(text)
        .filter_map(|caps| caps.name("math"))
        .map(|m| MaskSpan::new(Span::new(m.start(), m.end()), FALLBACK_MATH_TAG))
        .collect()
}

/// Add token-shaped text outside `spans` as spans of its own, keeping order
fn with_literal_tokens(text: &str, mut spans: Vec<MaskSpan>) -> Vec<MaskSpan> {
    let literals: Vec<MaskSpan> = MASK_TOKEN_REGEX
        .find_iter(text)
        .map(|m| MaskSpan::new(Span::new(m.start(), m.end()), LITERAL_TOKEN_TAG))
        .filter(|literal| !spans.iter().any(|span| span.overlaps(literal)))
        .collect();
    if literals.is_empty() {
        return spans;
    }
    debug!("Masking {} token-shaped literal(s) found in the source", literals.len());
    spans.extend(literals);
    spans.sort_by_key(|span| span.start);
    spans
}

fn error_position(error: &MaskingError) -> usize {
    match error {
        MaskingError::ParseError { position, .. } => *position,
    }
}

/// 1-based line and column of byte `position`
pub fn line_and_column(text: &str, position: usize) -> (usize, usize) {
    let mut position = position.min(text.len());
    while !text.is_char_boundary(position) {
        position -= 1;
    }
    let before = &text[..position];
    let line = before.matches('\n').count() + 1;
    let column = before.rfind('\n').map_or(before.chars().count(), |i| before[i + 1..].chars().count()) + 1;
    (line, column)
}

/// Replace `spans` (ascending, disjoint) in `text` and build the table
fn apply_spans(text: &str, spans: &[MaskSpan]) -> (String, MaskTable) {
    let mut table = MaskTable::new();
    let tokens: Vec<String> = spans
        .iter()
        .enumerate()
        .map(|(counter, span)| {
            let token = format_token(&span.tag, counter);
            table.push(MaskEntry {
                token: token.clone(),
                original: text[span.start..span.end].to_string(),
                tag: span.tag.clone(),
            });
            token
        })
        .collect();

    // descending start order keeps earlier offsets valid
    let mut masked = text.to_string();
    for (span, token) in spans.iter().zip(tokens.iter()).rev() {
        masked.replace_range(span.start..span.end, token);
    }
    (masked, table)
}
