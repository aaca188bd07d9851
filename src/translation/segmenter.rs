/*!
 * Paragraph-boundary chunking of masked text.
 *
 * Text is split into paragraphs and the blank-line runs between them; both
 * kinds of piece are kept, so concatenating the chunks gives back the input
 * exactly. Pieces are packed greedily into chunks of at most `max_chars`
 * characters. A paragraph longer than the limit becomes a chunk of its own.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// A line break followed by one or more blank lines, LF or CRLF
static PARAGRAPH_BREAK_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\r?\n(?:[ \t\r]*\n)+").expect("Invalid paragraph break regex"));

/// One unit of translation work
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentChunk {
    /// Position in the document; the only ordering key at reassembly
    pub index: usize,
    pub text: String,
}

impl DocumentChunk {
    /// Chunks with nothing to translate bypass the pipeline
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Paragraphs and separators in document order
fn pieces(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut last = 0;
    for m in PARAGRAPH_BREAK_REGEX.find_iter(text) {
        if m.start() > last {
            pieces.push(&text[last..m.start()]);
        }
        pieces.push(m.as_str());
        last = m.end();
    }
    if last < text.len() {
        pieces.push(&text[last..]);
    }
    pieces
}

/// Split `text` into chunks of roughly `max_chars` characters
pub fn segment(text: &str, max_chars: usize) -> Vec<DocumentChunk> {
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for piece in pieces(text) {
        let piece_chars = piece.chars().count();
        if !current.is_empty() && current_chars + piece_chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        current.push_str(piece);
        current_chars += piece_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| DocumentChunk { index, text })
        .collect()
}
