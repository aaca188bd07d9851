/*!
 * Tests for chunking of masked documents
 */

use paperglot::latex::mask;
use paperglot::latex::unmask::MASK_TOKEN_REGEX;
use paperglot::translation::segment;

use crate::common::{INTRO_TEX, MAIN_TEX, METHOD_TEX};

#[test]
fn test_segment_maskedFixtures_shouldConcatenateBackToInput() {
    for source in [MAIN_TEX, INTRO_TEX, METHOD_TEX] {
        let masked = mask(source).masked_text;
        for max_chars in [1, 16, 64, 4000] {
            let joined: String = segment(&masked, max_chars).into_iter().map(|c| c.text).collect();
            assert_eq!(joined, masked, "max_chars = {}", max_chars);
        }
    }
}

#[test]
fn test_segment_oversizedChunks_shouldHoldASingleParagraph() {
    let masked = mask(INTRO_TEX).masked_text;
    let max_chars = 40;

    for chunk in segment(&masked, max_chars) {
        if chunk.text.chars().count() > max_chars {
            assert!(!chunk.text.trim().contains("\n\n"), "packed chunk overflowed: {:?}", chunk.text);
        }
    }
}

#[test]
fn test_segment_shouldNeverSplitMaskTokens() {
    let doc = mask(METHOD_TEX);

    let tokens_in_chunks: usize = segment(&doc.masked_text, 8)
        .iter()
        .map(|chunk| MASK_TOKEN_REGEX.find_iter(&chunk.text).count())
        .sum();

    assert_eq!(tokens_in_chunks, doc.table.len());
}

#[test]
fn test_segment_indices_shouldFollowDocumentOrder() {
    let masked = mask(MAIN_TEX).masked_text;
    let chunks = segment(&masked, 30);

    assert!(chunks.len() > 1);
    assert!(chunks.iter().enumerate().all(|(i, chunk)| chunk.index == i));
}
