/*!
 * Tests for masking and unmasking of LaTeX sources
 */

use std::collections::HashSet;

use paperglot::app_config::MaskingSettings;
use paperglot::latex::{MaskingMode, MaskingRules, Masker, mask, unmask, unmask_with_report};

use crate::common::{INTRO_TEX, MAIN_TEX, METHOD_TEX, PREAMBLE_TEX};

fn corpus() -> Vec<&'static str> {
    vec![
        MAIN_TEX,
        INTRO_TEX,
        METHOD_TEX,
        PREAMBLE_TEX,
        "",
        "Plain prose without any markup.",
        "Inline \\(a+b\\) and display \\[ c \\] and $$ d $$.",
        "Costs 5\\$ and 10\\% of $x$.",
        "% a comment with $math$ and \\cite{x}\nvisible \\eqref{eq:1}",
        "\\verb|$not math$| then $y$",
        "Nested {groups {with $z$} inside} and \\textbf{bold \\ref{sec}}.",
        "\\begin{tabular}{cc} a & b \\\\ \\end{tabular} after",
        "Unclosed $math at the end",
        "\\begin{itemize}\n\\item one $1$\n\\item two\n",
        "stray } brace with $m$",
        "Placeholders look like [MASK_MATH_0000] here, and $x$ is math.",
        "Broken { with [MASK_R_MATH_0000] and $y$",
        "Windows\r\nline endings $a$\r\n\r\nwith \\ref{b}\r\n",
    ]
}

#[test]
fn test_mask_roundTrip_shouldRestoreEveryCorpusDocument() {
    for text in corpus() {
        let doc = mask(text);
        assert_eq!(unmask(&doc.masked_text, &doc.table), text, "round trip failed for {:?}", text);
    }
}

#[test]
fn test_mask_tokens_shouldBePairwiseDistinct() {
    for text in corpus() {
        let doc = mask(text);
        let tokens: HashSet<&str> = doc.table.tokens().collect();
        assert_eq!(tokens.len(), doc.table.len(), "duplicate token in {:?}", text);
    }
}

#[test]
fn test_mask_spans_shouldBeDisjointAndInBounds() {
    for text in corpus() {
        let doc = mask(text);
        for (i, a) in doc.spans.iter().enumerate() {
            assert!(a.end <= text.len());
            for b in doc.spans.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "overlapping spans in {:?}", text);
            }
        }
    }
}

#[test]
fn test_mask_malformedMarkup_shouldFallBackToMathOnly() {
    let doc = mask("stray } brace with $m$ and \\cite{kept}");

    assert_eq!(doc.mode, MaskingMode::Fallback);
    assert_eq!(doc.masked_text, "stray } brace with [MASK_R_MATH_0000] and \\cite{kept}");
}

#[test]
fn test_mask_starredFigure_shouldStayTransparent() {
    let doc = mask(INTRO_TEX);

    assert_eq!(doc.mode, MaskingMode::Structural);
    assert!(doc.masked_text.contains("\\begin{figure*}[t]"));
    assert!(doc.masked_text.contains("\\caption{Overview of the model.}"));
    assert!(doc.table.iter().any(|entry| entry.original == "\\label{fig:overview}"));
    assert!(doc.table.iter().any(|entry| entry.original.starts_with("\\includegraphics")));
}

#[test]
fn test_mask_codeAndStarredMath_shouldUseTheirTags() {
    let doc = mask(METHOD_TEX);

    assert_eq!(doc.mode, MaskingMode::Structural);
    let tags: Vec<&str> = doc.table.iter().map(|entry| entry.tag.as_str()).collect();
    assert_eq!(tags, vec!["ENV_EQUATION", "CODE_LSTLISTING", "ENV_ALIGNS"]);
    assert!(doc.masked_text.contains("\\begin{lstlisting}[language=Python]"));
    assert!(doc.masked_text.contains("\\end{lstlisting}"));
    assert!(!doc.masked_text.contains("budget"));
}

#[test]
fn test_masker_customSettings_shouldChangeClassification() {
    let mut settings = MaskingSettings::default();
    settings.atomic_macros.push("acro".to_string());
    settings.opaque_environments.retain(|name| name != "tabular");
    let masker = Masker::new(MaskingRules::from(&settings));

    let doc = masker.mask("Use \\acro{GPU} in \\begin{tabular}{c} x \\end{tabular}.");

    assert!(doc.masked_text.contains("[MASK_CMD_ACRO_0000]"));
    assert!(doc.masked_text.contains("\\begin{tabular}"));
}

#[test]
fn test_unmaskWithReport_droppedToken_shouldReportLoss() {
    let doc = mask("Energy $E$ and mass $m$.");
    let translated = "能量 [MASK_MATH_0000]。";

    let report = unmask_with_report(translated, &doc.table);

    assert_eq!(report.text, "能量 $E$。");
    assert_eq!(report.missing_tokens, vec!["[MASK_MATH_0001]".to_string()]);
    assert!(!report.is_complete());
}

#[test]
fn test_mask_preambleDefinitions_shouldStayStructural() {
    let doc = mask(PREAMBLE_TEX);

    assert_eq!(doc.mode, MaskingMode::Structural);
    let tags: Vec<&str> = doc.table.iter().map(|entry| entry.tag.as_str()).collect();
    assert_eq!(
        tags,
        vec![
            "CMD_NEWCOMMAND",
            "CMD_NEWCOMMAND",
            "CMD_NEWCOMMAND",
            "CMD_RENEWCOMMAND",
            "CMD_NEWENVIRONMENT",
            "CMD_DEF",
            "CMD_CITE",
            "CMD_REF",
            "MATH",
        ]
    );
    assert!(doc.masked_text.contains("As shown by [MASK_CMD_CITE_0006] in Table~[MASK_CMD_REF_0007], [MASK_MATH_0008] holds."));
    assert_eq!(doc.table.get("[MASK_CMD_NEWCOMMAND_0000]"), Some("\\newcommand{\\beq}{\\begin{equation}}"));
}

#[test]
fn test_mask_tokenShapedProse_shouldRoundTripVerbatim() {
    let source = "Placeholders look like [MASK_MATH_0000] here, and $x$ is math.";
    let doc = mask(source);

    assert_eq!(doc.table.len(), 2);
    assert!(doc.masked_text.contains("[MASK_MATH_0001] is math."));
    assert_eq!(unmask(&doc.masked_text, &doc.table), source);
}
