/*!
 * Strict recursive-descent LaTeX walker.
 *
 * The walker turns a document into a tree of [`DocumentNode`]s with byte
 * spans. It is deliberately strict about structure: an unbalanced brace, an
 * unterminated math region or a mismatched `\end` is reported as a
 * [`MaskingError::ParseError`] instead of being guessed around, so that the
 * masker can switch to its delimiter-only fallback.
 *
 * Definitions (`\newcommand`, `\newenvironment`, `\def` and friends) are
 * the exception. Their bodies routinely hold half an environment, as in
 * `\newcommand{\beq}{\begin{equation}}`, so their arguments are matched by
 * braces alone and never parsed as markup.
 *
 * Macro and environment argument shapes are short strings stored in
 * [`MaskingRules`]: `*` optional star, `[` optional
 * bracketed argument, `{` mandatory braced argument.
 */

use crate::errors::MaskingError;
use crate::latex::node::{DocumentNode, GroupDelimiter, MathDelimiter, Span};
use crate::latex::rules::MaskingRules;

/// Nesting limit; deeper documents are treated as unusable
const MAX_DEPTH: usize = 256;

/// What ends the node list currently being parsed
#[derive(Debug, Clone, Copy)]
enum Terminator<'n> {
    Eof,
    Brace,
    Bracket,
    Environment(&'n str),
}

/// Parse `source` into a node list using the argument specs of `rules`
pub fn parse(source: &str, rules: &MaskingRules) -> Result<Vec<DocumentNode>, MaskingError> {
    LatexParser::new(source, rules).parse_document()
}

/// Single-use parser over one document
pub struct LatexParser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    depth: usize,
    rules: &'a MaskingRules,
}

impl<'a> LatexParser<'a> {
    pub fn new(src: &'a str, rules: &'a MaskingRules) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            depth: 0,
            rules,
        }
    }

    /// Parse the whole input; fails unless every construct is closed
    pub fn parse_document(mut self) -> Result<Vec<DocumentNode>, MaskingError> {
        self.parse_nodes(Terminator::Eof)
    }

    fn error(&self, position: usize, message: impl Into<String>) -> MaskingError {
        MaskingError::ParseError {
            position,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn flush_chars(nodes: &mut Vec<DocumentNode>, run_start: &mut Option<usize>, end: usize) {
        if let Some(start) = run_start.take() {
            if end > start {
                nodes.push(DocumentNode::Chars { span: Span::new(start, end) });
            }
        }
    }

    fn parse_nodes(&mut self, until: Terminator<'_>) -> Result<Vec<DocumentNode>, MaskingError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(self.pos, "nesting too deep"));
        }

        let mut nodes = Vec::new();
        let mut run_start: Option<usize> = None;

        loop {
            let Some(byte) = self.peek() else {
                Self::flush_chars(&mut nodes, &mut run_start, self.pos);
                return match until {
                    Terminator::Eof => {
                        self.depth -= 1;
                        Ok(nodes)
                    }
                    Terminator::Brace => Err(self.error(self.pos, "unclosed '{' group")),
                    Terminator::Bracket => Err(self.error(self.pos, "unclosed '[' argument")),
                    Terminator::Environment(name) => {
                        Err(self.error(self.pos, format!("missing \\end{{{}}}", name)))
                    }
                };
            };

            match byte {
                b'%' => {
                    run_start.get_or_insert(self.pos);
                    self.skip_comment();
                }
                b'{' => {
                    Self::flush_chars(&mut nodes, &mut run_start, self.pos);
                    nodes.push(self.parse_group(GroupDelimiter::Brace)?);
                }
                b'}' => {
                    if matches!(until, Terminator::Brace) {
                        Self::flush_chars(&mut nodes, &mut run_start, self.pos);
                        self.depth -= 1;
                        return Ok(nodes);
                    }
                    return Err(self.error(self.pos, "unmatched '}'"));
                }
                b']' if matches!(until, Terminator::Bracket) => {
                    Self::flush_chars(&mut nodes, &mut run_start, self.pos);
                    self.depth -= 1;
                    return Ok(nodes);
                }
                b'$' => {
                    Self::flush_chars(&mut nodes, &mut run_start, self.pos);
                    nodes.push(self.parse_dollar_math()?);
                }
                b'\\' => match self.peek_at(1) {
                    Some(b'(') => {
                        Self::flush_chars(&mut nodes, &mut run_start, self.pos);
                        nodes.push(self.parse_escaped_math(MathDelimiter::Paren)?);
                    }
                    Some(b'[') => {
                        Self::flush_chars(&mut nodes, &mut run_start, self.pos);
                        nodes.push(self.parse_escaped_math(MathDelimiter::Bracket)?);
                    }
                    Some(b')') | Some(b']') => {
                        return Err(self.error(self.pos, "math close delimiter without opener"));
                    }
                    Some(next) if is_name_byte(next) => {
                        let start = self.pos;
                        let name = self.read_macro_name();
                        match name.as_str() {
                            "begin" => {
                                Self::flush_chars(&mut nodes, &mut run_start, start);
                                nodes.push(self.parse_environment(start)?);
                            }
                            "end" => {
                                let env_name = self.read_braced_name(start)?;
                                return match until {
                                    Terminator::Environment(open) if open == env_name => {
                                        Self::flush_chars(&mut nodes, &mut run_start, start);
                                        self.pos = start;
                                        self.depth -= 1;
                                        Ok(nodes)
                                    }
                                    Terminator::Environment(open) => Err(self.error(
                                        start,
                                        format!("\\end{{{}}} closes \\begin{{{}}}", env_name, open),
                                    )),
                                    _ => Err(self.error(start, format!("unexpected \\end{{{}}}", env_name))),
                                };
                            }
                            _ => {
                                Self::flush_chars(&mut nodes, &mut run_start, start);
                                let node = match self.rules.definition_groups(&name) {
                                    Some(groups) => self.parse_definition(start, name, groups)?,
                                    None => self.parse_macro(start, name)?,
                                };
                                nodes.push(node);
                            }
                        }
                    }
                    Some(_) => {
                        let start = self.pos;
                        Self::flush_chars(&mut nodes, &mut run_start, start);
                        let symbol = self.src[start + 1..].chars().next().map(String::from).unwrap_or_default();
                        self.pos += 1 + symbol.len();
                        nodes.push(self.finish_macro(start, symbol)?);
                    }
                    None => return Err(self.error(self.pos, "dangling backslash at end of input")),
                },
                _ => {
                    run_start.get_or_insert(self.pos);
                    self.pos += 1;
                }
            }
        }
    }

    fn skip_comment(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// Skip spaces, tabs and at most one line break
    fn skip_inline_whitespace(&mut self) {
        let mut newlines = 0;
        while let Some(byte) = self.peek() {
            match byte {
                b' ' | b'\t' | b'\r' => self.pos += 1,
                b'\n' if newlines == 0 => {
                    newlines += 1;
                    self.pos += 1;
                }
                _ => break,
            }
        }
    }

    fn read_macro_name(&mut self) -> String {
        self.pos += 1;
        let start = self.pos;
        while self.peek().is_some_and(is_name_byte) {
            self.pos += 1;
        }
        self.src[start..self.pos].to_string()
    }

    /// Read `{name}` after `\begin` or `\end`
    fn read_braced_name(&mut self, command_start: usize) -> Result<String, MaskingError> {
        self.skip_inline_whitespace();
        if self.peek() != Some(b'{') {
            return Err(self.error(command_start, "environment command without a name"));
        }
        let open = self.pos;
        let Some(close) = self.src[open..].find('}') else {
            return Err(self.error(open, "unterminated environment name"));
        };
        let name = self.src[open + 1..open + close].trim().to_string();
        if name.is_empty() {
            return Err(self.error(open, "empty environment name"));
        }
        self.pos = open + close + 1;
        Ok(name)
    }

    fn parse_group(&mut self, delimiter: GroupDelimiter) -> Result<DocumentNode, MaskingError> {
        let start = self.pos;
        self.pos += 1;
        let terminator = match delimiter {
            GroupDelimiter::Brace => Terminator::Brace,
            GroupDelimiter::Bracket => Terminator::Bracket,
        };
        let children = self.parse_nodes(terminator)?;
        // parse_nodes stops on the closing delimiter without consuming it
        self.pos += 1;
        Ok(DocumentNode::Group {
            span: Span::new(start, self.pos),
            delimiter,
            children,
        })
    }

    /// Consume the arguments described by `spec`; returns whether a star was seen
    fn parse_args(&mut self, spec: &str, args: &mut Vec<DocumentNode>) -> Result<bool, MaskingError> {
        let mut starred = false;
        for kind in spec.chars() {
            let mark = self.pos;
            match kind {
                '*' => {
                    if self.peek() == Some(b'*') {
                        self.pos += 1;
                        starred = true;
                    }
                }
                '[' => {
                    self.skip_inline_whitespace();
                    if self.peek() == Some(b'[') {
                        args.push(self.parse_group(GroupDelimiter::Bracket)?);
                    } else {
                        self.pos = mark;
                    }
                }
                '{' => {
                    self.skip_inline_whitespace();
                    if self.peek() == Some(b'{') {
                        args.push(self.parse_group(GroupDelimiter::Brace)?);
                    } else {
                        // a missing mandatory argument ends argument parsing
                        self.pos = mark;
                        break;
                    }
                }
                _ => {}
            }
        }
        Ok(starred)
    }

    fn parse_macro(&mut self, start: usize, name: String) -> Result<DocumentNode, MaskingError> {
        if name == "verb" {
            return self.parse_verb(start);
        }
        self.finish_macro(start, name)
    }

    fn finish_macro(&mut self, start: usize, name: String) -> Result<DocumentNode, MaskingError> {
        let mut args = Vec::new();
        let starred = match self.rules.macro_arg_spec(&name) {
            Some(spec) => self.parse_args(spec, &mut args)?,
            None => false,
        };
        Ok(DocumentNode::Macro {
            span: Span::new(start, self.pos),
            name,
            starred,
            args,
        })
    }

    /// `\verb<d>...<d>` and `\verb*<d>...<d>` with a raw body on one line
    fn parse_verb(&mut self, start: usize) -> Result<DocumentNode, MaskingError> {
        let mut starred = false;
        if self.peek() == Some(b'*') {
            starred = true;
            self.pos += 1;
        }
        let Some(delimiter) = self.src[self.pos..].chars().next() else {
            return Err(self.error(start, "\\verb without delimiter"));
        };
        let body_start = self.pos + delimiter.len_utf8();
        let line_end = self.src[body_start..].find('\n').map_or(self.src.len(), |i| body_start + i);
        let Some(close) = self.src[body_start..line_end].find(delimiter) else {
            return Err(self.error(start, "unterminated \\verb"));
        };
        let body_end = body_start + close;
        self.pos = body_end + delimiter.len_utf8();
        Ok(DocumentNode::Macro {
            span: Span::new(start, self.pos),
            name: "verb".to_string(),
            starred,
            args: vec![DocumentNode::Chars { span: Span::new(body_start, body_end) }],
        })
    }

    /// A definition command with its name, optional arguments and bodies
    fn parse_definition(&mut self, start: usize, name: String, groups: usize) -> Result<DocumentNode, MaskingError> {
        let mut starred = false;
        if self.peek() == Some(b'*') {
            starred = true;
            self.pos += 1;
        }
        // \def-style: control sequence, parameter text, one body
        let tex_primitive = groups == 1;
        let mut remaining = groups;
        let mut args = Vec::new();

        while remaining > 0 {
            let mark = self.pos;
            self.skip_inline_whitespace();
            match self.peek() {
                Some(b'{') => {
                    args.push(self.read_balanced_group(b'}')?);
                    remaining -= 1;
                }
                Some(b'[') if !tex_primitive && !args.is_empty() => {
                    args.push(self.read_balanced_group(b']')?);
                }
                Some(b'\\') if args.is_empty() => {
                    let cs_start = self.pos;
                    self.read_control_sequence();
                    args.push(DocumentNode::Chars { span: Span::new(cs_start, self.pos) });
                    if tex_primitive {
                        self.skip_parameter_text();
                    } else {
                        remaining -= 1;
                    }
                }
                _ => {
                    self.pos = mark;
                    break;
                }
            }
        }

        Ok(DocumentNode::Macro {
            span: Span::new(start, self.pos),
            name,
            starred,
            args,
        })
    }

    /// `\name` or a single-symbol control sequence such as `\@` or `\,`
    fn read_control_sequence(&mut self) {
        if self.peek_at(1).is_some_and(is_name_byte) {
            self.read_macro_name();
        } else {
            self.pos += 1;
            self.pos += self.src[self.pos..].chars().next().map_or(0, char::len_utf8);
        }
    }

    /// `#1#2` or delimiter text between a `\def` name and its body, which
    /// must start on the same line
    fn skip_parameter_text(&mut self) {
        while let Some(byte) = self.peek() {
            if byte == b'{' || byte == b'\n' {
                break;
            }
            self.pos += 1;
        }
    }

    /// A `{...}` or `[...]` group matched by counting braces only; `\begin`
    /// and `\end` inside are plain text
    fn read_balanced_group(&mut self, close: u8) -> Result<DocumentNode, MaskingError> {
        let start = self.pos;
        let mut depth = 0usize;
        let mut i = start + 1;

        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => {
                    i += 2;
                    continue;
                }
                b'%' => {
                    while i < self.bytes.len() && self.bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
                b'{' => depth += 1,
                byte if byte == close && depth == 0 => {
                    self.pos = i + 1;
                    let inner = Span::new(start + 1, i);
                    let children = if inner.is_empty() {
                        Vec::new()
                    } else {
                        vec![DocumentNode::Chars { span: inner }]
                    };
                    let delimiter = if close == b'}' { GroupDelimiter::Brace } else { GroupDelimiter::Bracket };
                    return Ok(DocumentNode::Group {
                        span: Span::new(start, self.pos),
                        delimiter,
                        children,
                    });
                }
                b'}' => {
                    if depth == 0 {
                        return Err(self.error(i, "unmatched '}' in definition"));
                    }
                    depth -= 1;
                }
                _ => {}
            }
            i += 1;
        }
        Err(self.error(start, "unclosed definition argument"))
    }

    fn parse_environment(&mut self, start: usize) -> Result<DocumentNode, MaskingError> {
        let name = self.read_braced_name(start)?;

        let mut args = Vec::new();
        if let Some(spec) = self.rules.environment_arg_spec(&name) {
            self.parse_args(spec, &mut args)?;
        }

        let children = if self.rules.is_code_environment(&name) {
            self.parse_raw_body(&name)?
        } else {
            let children = self.parse_nodes(Terminator::Environment(&name))?;
            // parse_nodes rewinds to the matching \end; step over it
            let end_start = self.pos;
            self.read_macro_name();
            self.read_braced_name(end_start)?;
            children
        };

        Ok(DocumentNode::Environment {
            span: Span::new(start, self.pos),
            name,
            args,
            children,
        })
    }

    /// Body of a verbatim-like environment, read up to the literal `\end{name}`
    fn parse_raw_body(&mut self, name: &str) -> Result<Vec<DocumentNode>, MaskingError> {
        let closing = format!("\\end{{{}}}", name);
        let Some(offset) = self.src[self.pos..].find(&closing) else {
            return Err(self.error(self.pos, format!("missing {}", closing)));
        };
        let body = Span::new(self.pos, self.pos + offset);
        self.pos = body.end + closing.len();
        if body.is_empty() {
            Ok(Vec::new())
        } else {
            Ok(vec![DocumentNode::Chars { span: body }])
        }
    }

    fn parse_dollar_math(&mut self) -> Result<DocumentNode, MaskingError> {
        let start = self.pos;
        let display = self.peek_at(1) == Some(b'$');
        let mut i = start + if display { 2 } else { 1 };

        while i < self.bytes.len() {
            match self.bytes[i] {
                b'\\' => i += 2,
                b'$' if display => {
                    if self.bytes.get(i + 1) == Some(&b'$') {
                        self.pos = i + 2;
                        return Ok(DocumentNode::MathRegion {
                            span: Span::new(start, self.pos),
                            delimiter: MathDelimiter::DoubleDollar,
                        });
                    }
                    i += 1;
                }
                b'$' => {
                    self.pos = i + 1;
                    return Ok(DocumentNode::MathRegion {
                        span: Span::new(start, self.pos),
                        delimiter: MathDelimiter::Dollar,
                    });
                }
                b'\n' if !display && self.blank_line_after(i) => {
                    return Err(self.error(start, "paragraph break inside inline math"));
                }
                _ => i += 1,
            }
        }
        Err(self.error(start, "unclosed math region"))
    }

    /// Whether the line break at `i` is followed by a blank line (LF or CRLF)
    fn blank_line_after(&self, i: usize) -> bool {
        let rest = &self.bytes[i + 1..];
        let skipped = rest.iter().take_while(|&&b| matches!(b, b' ' | b'\t' | b'\r')).count();
        rest.get(skipped) == Some(&b'\n')
    }

    fn parse_escaped_math(&mut self, delimiter: MathDelimiter) -> Result<DocumentNode, MaskingError> {
        let start = self.pos;
        let closer = match delimiter {
            MathDelimiter::Paren => b')',
            _ => b']',
        };
        let mut i = start + 2;
        while i < self.bytes.len() {
            if self.bytes[i] == b'\\' {
                if self.bytes.get(i + 1) == Some(&closer) {
                    self.pos = i + 2;
                    return Ok(DocumentNode::MathRegion {
                        span: Span::new(start, self.pos),
                        delimiter,
                    });
                }
                i += 2;
            } else {
                i += 1;
            }
        }
        Err(self.error(start, "unclosed math region"))
    }
}

fn is_name_byte(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'@'
}
