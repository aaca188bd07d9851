/*!
 * Node tree produced by the LaTeX walker.
 *
 * Every node carries the byte span it covers in the source text. Nodes are
 * built once per masking call and dropped as soon as the mask spans have been
 * collected.
 */

/// Half-open byte range `[start, end)` into the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// How a math region was delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathDelimiter {
    /// `$...$`
    Dollar,
    /// `$$...$$`
    DoubleDollar,
    /// `\(...\)`
    Paren,
    /// `\[...\]`
    Bracket,
}

impl MathDelimiter {
    pub fn is_display(&self) -> bool {
        matches!(self, Self::DoubleDollar | Self::Bracket)
    }
}

/// Which bracket pair delimits a group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupDelimiter {
    /// `{...}`
    Brace,
    /// `[...]`, only produced for optional arguments
    Bracket,
}

/// One node of the document tree
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentNode {
    /// Plain text, whitespace, comments and `[`/`]` outside argument position
    Chars { span: Span },

    /// `\name` (or a control symbol such as `\%`) with the arguments its
    /// argument spec consumed
    Macro {
        span: Span,
        name: String,
        starred: bool,
        args: Vec<DocumentNode>,
    },

    /// A braced group, or a bracketed optional argument
    Group {
        span: Span,
        delimiter: GroupDelimiter,
        children: Vec<DocumentNode>,
    },

    /// Delimiter-bounded math; the content is not parsed further
    MathRegion { span: Span, delimiter: MathDelimiter },

    /// `\begin{name}...\end{name}`; `args` are the arguments following
    /// `\begin{name}`, `children` the body
    Environment {
        span: Span,
        name: String,
        args: Vec<DocumentNode>,
        children: Vec<DocumentNode>,
    },
}

impl DocumentNode {
    pub fn span(&self) -> Span {
        match self {
            Self::Chars { span }
            | Self::Macro { span, .. }
            | Self::Group { span, .. }
            | Self::MathRegion { span, .. }
            | Self::Environment { span, .. } => *span,
        }
    }

    /// Nodes a transparent traversal descends into, in document order
    pub fn child_nodes(&self) -> Box<dyn Iterator<Item = &DocumentNode> + '_> {
        match self {
            Self::Chars { .. } | Self::MathRegion { .. } => Box::new(std::iter::empty()),
            Self::Macro { args, .. } => Box::new(args.iter()),
            Self::Group { children, .. } => Box::new(children.iter()),
            Self::Environment { args, children, .. } => Box::new(args.iter().chain(children.iter())),
        }
    }

    /// Short variant label, used in debug logging
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Chars { .. } => "chars",
            Self::Macro { .. } => "macro",
            Self::Group { .. } => "group",
            Self::MathRegion { .. } => "math",
            Self::Environment { .. } => "environment",
        }
    }
}
