/*!
 * Title and abstract extraction from a paper's main file.
 */

use once_cell::sync::Lazy;
use regex::Regex;

/// `\title{...}` allowing one level of nested braces
static TITLE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\\title\s*(?:\[[^\]]*\])?\s*\{((?:[^{}]|\{[^{}]*\})*)\}").expect("Invalid title regex"));

static ABSTRACT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\\begin\{abstract\}(.*?)\\end\{abstract\}").expect("Invalid abstract regex")
});

/// Metadata used as context for terminology generation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaperMetadata {
    pub title: Option<String>,
    pub abstract_text: Option<String>,
}

impl PaperMetadata {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.abstract_text.is_none()
    }
}

/// Drop comment lines and fold the rest onto one line
pub fn clean_tex(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('%'))
        .collect::<Vec<_>>()
        .join(" ")
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}

/// Extract the title and abstract of `tex`, when present
pub fn extract_metadata(tex: &str) -> PaperMetadata {
    let title = TITLE_REGEX
        .captures(tex)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(clean_tex(m.as_str())));

    let abstract_text = ABSTRACT_REGEX
        .captures(tex)
        .and_then(|caps| caps.get(1))
        .and_then(|m| non_empty(clean_tex(m.as_str())));

    PaperMetadata { title, abstract_text }
}
