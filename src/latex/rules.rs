/*!
 * Masking rules and node classification.
 *
 * `MaskingRules` holds the configured name sets; `classify` is a pure
 * function from a node to what the masker should do with it. Rules are
 * checked in a fixed order and the first match wins:
 *
 * 1. math regions and math environments
 * 2. atomic reference-family macros and macro/environment definitions
 * 3. opaque environments (starred names fold onto their base name unless the
 *    name is listed as transparent)
 * 4. code-content environments
 * 5. everything else is transparent
 */

use std::collections::{HashMap, HashSet};

use crate::app_config::MaskingSettings;
use crate::latex::node::DocumentNode;

pub const DEFAULT_ATOMIC_MACROS: &[&str] = &[
    "cite", "citep", "citet", "citealp", "citeauthor", "citeyear", "nocite", "ref", "eqref", "cref", "Cref",
    "autoref", "pageref", "label", "input", "include", "includegraphics", "url", "verb",
];

pub const DEFAULT_OPAQUE_ENVIRONMENTS: &[&str] = &[
    "equation", "align", "gather", "multline", "eqnarray", "flalign", "alignat", "tabular", "tabularx", "longtable",
    "tikzpicture", "axodraw", "algorithmic",
];

pub const DEFAULT_CODE_ENVIRONMENTS: &[&str] = &["lstlisting", "verbatim", "Verbatim", "minted"];

pub const DEFAULT_MATH_ENVIRONMENTS: &[&str] = &["math", "displaymath"];

pub const DEFAULT_TRANSPARENT_ENVIRONMENTS: &[&str] = &["figure", "table"];

/// Argument shapes for macros the walker must consume arguments for
const MACRO_ARG_SPECS: &[(&str, &str)] = &[
    ("cite", "*[[{"),
    ("citep", "*[[{"),
    ("citet", "*[[{"),
    ("citealp", "*[[{"),
    ("citeauthor", "*[[{"),
    ("citeyear", "*[[{"),
    ("nocite", "{"),
    ("ref", "*{"),
    ("eqref", "{"),
    ("cref", "*{"),
    ("Cref", "*{"),
    ("autoref", "*{"),
    ("pageref", "*{"),
    ("label", "{"),
    ("input", "{"),
    ("include", "{"),
    ("includegraphics", "*[[{"),
    ("url", "{"),
    ("href", "{{"),
    ("\\", "*["),
];

/// Definition commands and how many braced groups they take. A control
/// sequence written without braces (`\newcommand\foo`) counts as the first
/// group; the `\def` family always names a control sequence first.
const DEFINITION_MACROS: &[(&str, usize)] = &[
    ("newcommand", 2),
    ("renewcommand", 2),
    ("providecommand", 2),
    ("DeclareRobustCommand", 2),
    ("DeclareMathOperator", 2),
    ("newenvironment", 3),
    ("renewenvironment", 3),
    ("def", 1),
    ("gdef", 1),
    ("edef", 1),
    ("xdef", 1),
];

/// Default shape for atomic macros without an explicit entry
const ATOMIC_FALLBACK_SPEC: &str = "*[[{";

const ENVIRONMENT_ARG_SPECS: &[(&str, &str)] = &[
    ("lstlisting", "["),
    ("minted", "[{"),
    ("Verbatim", "["),
    ("figure", "["),
    ("figure*", "["),
    ("table", "["),
    ("table*", "["),
    ("tabular", "[{"),
    ("tabular*", "{[{"),
    ("tabularx", "{[{"),
    ("longtable", "[{"),
    ("alignat", "{"),
    ("alignat*", "{"),
    ("tikzpicture", "["),
    ("algorithmic", "["),
];

/// What the masker does with one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Mask the whole node span with a token of this type tag
    Opaque(String),
    /// Mask only the body range, keeping the wrapper
    CodeContent(String),
    /// Leave in place and look at the children
    Transparent,
}

/// Name sets driving classification
#[derive(Debug, Clone)]
pub struct MaskingRules {
    atomic_macros: HashSet<String>,
    opaque_environments: HashSet<String>,
    code_environments: HashSet<String>,
    math_environments: HashSet<String>,
    transparent_environments: HashSet<String>,
    macro_arg_specs: HashMap<&'static str, &'static str>,
    environment_arg_specs: HashMap<&'static str, &'static str>,
}

fn to_set<S: AsRef<str>>(names: &[S]) -> HashSet<String> {
    names.iter().map(|n| n.as_ref().to_string()).collect()
}

fn base_name(name: &str) -> &str {
    name.trim_end_matches('*')
}

impl MaskingRules {
    pub fn new<S: AsRef<str>>(
        atomic_macros: &[S],
        opaque_environments: &[S],
        code_environments: &[S],
        math_environments: &[S],
        transparent_environments: &[S],
    ) -> Self {
        Self {
            atomic_macros: to_set(atomic_macros),
            opaque_environments: to_set(opaque_environments),
            code_environments: to_set(code_environments),
            math_environments: to_set(math_environments),
            transparent_environments: to_set(transparent_environments),
            macro_arg_specs: MACRO_ARG_SPECS.iter().copied().collect(),
            environment_arg_specs: ENVIRONMENT_ARG_SPECS.iter().copied().collect(),
        }
    }

    pub fn is_atomic_macro(&self, name: &str) -> bool {
        self.atomic_macros.contains(name)
    }

    /// Verbatim-like environments whose body the walker reads raw
    pub fn is_code_environment(&self, name: &str) -> bool {
        self.code_environments.contains(name) || self.code_environments.contains(base_name(name))
    }

    pub fn is_math_environment(&self, name: &str) -> bool {
        self.math_environments.contains(name) || self.math_environments.contains(base_name(name))
    }

    /// Opaque check with star folding; transparent names always win
    pub fn is_opaque_environment(&self, name: &str) -> bool {
        let base = base_name(name);
        if self.transparent_environments.contains(name) || self.transparent_environments.contains(base) {
            return false;
        }
        self.opaque_environments.contains(name) || self.opaque_environments.contains(base)
    }

    pub fn macro_arg_spec(&self, name: &str) -> Option<&'static str> {
        match self.macro_arg_specs.get(name) {
            Some(spec) => Some(*spec),
            None if self.is_atomic_macro(name) => Some(ATOMIC_FALLBACK_SPEC),
            None => None,
        }
    }

    pub fn environment_arg_spec(&self, name: &str) -> Option<&'static str> {
        self.environment_arg_specs.get(name).copied()
    }

    /// Braced groups taken by a definition command, `None` for other macros
    pub fn definition_groups(&self, name: &str) -> Option<usize> {
        DEFINITION_MACROS.iter().find(|(n, _)| *n == name).map(|&(_, groups)| groups)
    }
}

impl Default for MaskingRules {
    fn default() -> Self {
        Self::new(
            DEFAULT_ATOMIC_MACROS,
            DEFAULT_OPAQUE_ENVIRONMENTS,
            DEFAULT_CODE_ENVIRONMENTS,
            DEFAULT_MATH_ENVIRONMENTS,
            DEFAULT_TRANSPARENT_ENVIRONMENTS,
        )
    }
}

impl From<&MaskingSettings> for MaskingRules {
    fn from(settings: &MaskingSettings) -> Self {
        Self::new(
            &settings.atomic_macros,
            &settings.opaque_environments,
            &settings.code_environments,
            &settings.math_environments,
            &settings.transparent_environments,
        )
    }
}

/// Upper-cased tag fragment for a name; `*` becomes `S`
pub fn tag_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '*' { 'S' } else { c.to_ascii_uppercase() })
        .collect()
}

/// Decide how the masker treats `node`
pub fn classify(node: &DocumentNode, rules: &MaskingRules) -> Classification {
    match node {
        DocumentNode::MathRegion { .. } => Classification::Opaque("MATH".to_string()),
        DocumentNode::Macro { name, .. }
            if rules.is_atomic_macro(name) || rules.definition_groups(name).is_some() =>
        {
            Classification::Opaque(format!("CMD_{}", tag_name(name)))
        }
        DocumentNode::Environment { name, .. } => {
            if rules.is_math_environment(name) {
                Classification::Opaque("MATH".to_string())
            } else if rules.is_opaque_environment(name) {
                Classification::Opaque(format!("ENV_{}", tag_name(name)))
            } else if rules.is_code_environment(name) {
                Classification::CodeContent(format!("CODE_{}", tag_name(name)))
            } else {
                Classification::Transparent
            }
        }
        _ => Classification::Transparent,
    }
}
