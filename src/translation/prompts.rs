/*!
 * Instruction templates for the language-model services.
 *
 * Every service gets fixed rules in the system prompt and the material to
 * work on in the user message. Placeholders are `{source_language}`,
 * `{target_language}` and `{terminology}`.
 */

use crate::providers::ChatPrompt;
use crate::translation::terminology::TerminologyMap;

/// Prompt template with named placeholders
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: &'static str,
}

impl PromptTemplate {
    pub const TRANSLATOR: &'static str = r#"You are a professional academic translator specializing in LaTeX papers.
Translate the LaTeX text chunk you receive from {source_language} into {target_language}, strictly following the terminology dictionary.

Terminology Dictionary:
{terminology}

Rules:
1. Mask Preservation: the text contains tokens such as [MASK_MATH_0001], [MASK_CMD_CITE_0002] or [MASK_ENV_TABULAR_0003]. Copy every token EXACTLY once, unchanged, at the logically corresponding position. Never translate, split, or add spaces inside a token.
2. LaTeX Commands: do not translate command names such as \section, \textbf, \item or \caption. Translate only the natural-language content inside text-bearing commands (e.g. the title in \section{title}).
3. Academic Tone: use formal, objective, precise academic {target_language}.
4. No Commentary: return ONLY the translated text. No preface, no explanations, no markdown code fences."#;

    pub const CRITIC: &'static str = r#"You are a QA critic for a LaTeX translation system.
Verify a {target_language} translation against its {source_language} original for safety, syntax and quality.

Checks:
1. safe: every [MASK_...] token of the original appears in the translation exactly once, unchanged, and no other tokens were added.
2. syntax_valid: LaTeX syntax is valid (balanced braces, intact command structure).
3. quality_pass: the translation is complete and fluent.

Return ONLY a JSON object:
{
    "safe": true,
    "syntax_valid": true,
    "quality_pass": true,
    "errors": ["one entry per problem found"]
}"#;

    pub const FIXER: &'static str = r#"You are a translation fixer for LaTeX papers.
A {target_language} translation of a {source_language} LaTeX chunk failed a quality check. Rewrite it so that every listed error is fixed.

Terminology Dictionary:
{terminology}

Rules:
1. Every [MASK_...] token of the original must appear exactly once, unchanged.
2. The result must be valid LaTeX with the same commands as the original.
3. Return ONLY the fixed translation, without commentary or code fences."#;

    pub const TERMINOLOGY: &'static str = r#"You are an expert academic translator specializing in exact terminology.
Analyze the research paper abstract you receive, extract its specific technical terms and give their standard {target_language} academic translations.

Return ONLY a JSON object whose keys are {source_language} terms and whose values are {target_language} translations, for example:
{
    "Large Language Models": "大语言模型",
    "zero-shot learning": "零样本学习"
}

Prefer standard academic usage in computer science, physics and mathematics."#;

    pub fn new(template: &'static str) -> Self {
        Self { template }
    }

    /// Render the template with the given variables
    pub fn render(&self, source_language: &str, target_language: &str, terminology: &str) -> String {
        self.template
            .replace("{source_language}", source_language)
            .replace("{target_language}", target_language)
            .replace("{terminology}", terminology)
    }
}

/// Builds the four service prompts for one language pair
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    source_language: String,
    target_language: String,
}

impl PromptBuilder {
    /// Languages are readable names, not codes
    pub fn new(source_language: impl Into<String>, target_language: impl Into<String>) -> Self {
        Self {
            source_language: source_language.into(),
            target_language: target_language.into(),
        }
    }

    fn system(&self, template: &'static str, terminology: &TerminologyMap) -> String {
        PromptTemplate::new(template).render(&self.source_language, &self.target_language, &terminology.to_prompt_json())
    }

    pub fn translate(&self, chunk: &str, terminology: &TerminologyMap, temperature: f32) -> ChatPrompt {
        ChatPrompt::new(self.system(PromptTemplate::TRANSLATOR, terminology), chunk, temperature)
    }

    pub fn critique(&self, original: &str, translated: &str, temperature: f32) -> ChatPrompt {
        let user = format!("Original Text:\n{}\n\nTranslated Text:\n{}", original, translated);
        ChatPrompt::new(self.system(PromptTemplate::CRITIC, &TerminologyMap::new()), user, temperature)
    }

    pub fn repair(
        &self,
        original: &str,
        failed: &str,
        errors: &[String],
        terminology: &TerminologyMap,
        temperature: f32,
    ) -> ChatPrompt {
        let errors_json = serde_json::to_string(errors).unwrap_or_else(|_| errors.join("; "));
        let user = format!(
            "Original Text:\n{}\n\nFailed Translation:\n{}\n\nErrors Identified:\n{}",
            original, failed, errors_json
        );
        ChatPrompt::new(self.system(PromptTemplate::FIXER, terminology), user, temperature)
    }

    pub fn terminology(&self, abstract_text: &str, temperature: f32) -> ChatPrompt {
        ChatPrompt::new(self.system(PromptTemplate::TERMINOLOGY, &TerminologyMap::new()), abstract_text, temperature)
    }
}
