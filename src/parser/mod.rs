//! Recursive-descent wakefile parser
//!
//! This module turns wakefile text into a validated [`Model`]. Lexing is driven
//! from here: each production asks the [`Tokenizer`] for the next token in the
//! [`LexicalContext`] it expects, so variable values can be whitespace-sensitive
//! while the rest of the grammar is not.

pub mod error;
pub mod tokenizer;

pub use error::{ParseError, render};
pub use tokenizer::{LexError, LexicalContext, Position, Token, TokenKind, Tokenizer};

use crate::ast::{Flag, Label, Model, Param, Shell, Value};
use tracing::debug;

/// Parse wakefile text into a [`Model`].
///
/// # Errors
///
/// Returns the first [`ParseError`] encountered; no partial model is produced.
pub fn parse_str(text: &str) -> Result<Model, ParseError> {
    Parser::new(text).parse()
}

/// Single-use parser; [`Parser::parse`] consumes it.
pub struct Parser<'a> {
    tokens: Tokenizer<'a>,
    model: Model,
    shell_declared: bool,
}

impl<'a> Parser<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            tokens: Tokenizer::new(text),
            model: Model::default(),
            shell_declared: false,
        }
    }

    /// Parse the whole input.
    ///
    /// # Errors
    ///
    /// Returns `Err` on the first lexing or grammar violation, such as:
    /// - an unsupported shell name
    /// - a variable without a value, or defined twice
    /// - a label or alias defined twice
    /// - a label whose `@len` disagrees with its body
    pub fn parse(mut self) -> Result<Model, ParseError> {
        loop {
            let token = self.tokens.next(LexicalContext::Model, true)?;
            match token.kind {
                TokenKind::Eof => break,
                TokenKind::Shell => self.shell(&token)?,
                TokenKind::Identifier => self.variable(&token)?,
                TokenKind::Label => self.label(&token)?,
                _ => {
                    return Err(self.unexpected(
                        &token,
                        &[TokenKind::Shell, TokenKind::Identifier, TokenKind::Label],
                    ));
                }
            }
        }
        debug!(
            shell = %self.model.shell,
            variables = self.model.variables.len(),
            labels = self.model.labels.len(),
            "wakefile parsed"
        );
        Ok(self.model)
    }

    // shell := "shell" ASSIGN IDENTIFIER
    fn shell(&mut self, keyword: &Token) -> Result<(), ParseError> {
        if self.shell_declared {
            return Err(ParseError::DuplicateShell {
                position: self.position(keyword.offset),
            });
        }
        self.expect(LexicalContext::Model, TokenKind::Assign)?;
        let name = self.expect(LexicalContext::Model, TokenKind::Identifier)?;
        let shell = Shell::from_name(&name.text).ok_or_else(|| ParseError::UnsupportedShell {
            name: name.text.clone(),
            position: self.position(name.offset),
        })?;
        debug!(%shell, "shell selected");
        self.model.shell = shell;
        self.shell_declared = true;
        Ok(())
    }

    // variable := IDENTIFIER ASSIGN value
    fn variable(&mut self, name: &Token) -> Result<(), ParseError> {
        if self.model.variable(&name.text).is_some() {
            return Err(ParseError::DuplicateVariable {
                name: name.text.clone(),
                position: self.position(name.offset),
            });
        }
        self.expect(LexicalContext::Model, TokenKind::Assign)?;

        let mut parts = Vec::new();
        loop {
            let token = self.tokens.next(LexicalContext::Value, false)?;
            match token.kind {
                TokenKind::Whitespace => {}
                TokenKind::Comment | TokenKind::Newline | TokenKind::Eof => break,
                TokenKind::String => parts.push(unquote(&token.text)),
                TokenKind::Word => parts.push(token.text),
                _ => {
                    return Err(self.unexpected(&token, &[TokenKind::String, TokenKind::Word]));
                }
            }
        }

        let value = Value::from_parts(parts).ok_or_else(|| ParseError::EmptyValue {
            name: name.text.clone(),
            position: self.position(name.offset),
        })?;
        debug!(name = %name.text, ?value, "variable");
        self.model.variables.push((name.text.clone(), value));
        Ok(())
    }

    // label := LABEL header* body
    fn label(&mut self, header: &Token) -> Result<(), ParseError> {
        let (name, short) = split_label_header(&header.text);
        let position = self.position(header.offset);

        let clash = std::iter::once(name.as_str())
            .chain(short.as_deref())
            .find(|candidate| self.model.find_label(candidate).is_some());
        if let Some(clash) = clash.or_else(|| short.as_deref().filter(|s| *s == name)) {
            return Err(ParseError::DuplicateLabel {
                name: clash.to_string(),
                position,
            });
        }

        let mut label = Label::new(name, short);
        let mut in_body = false;
        loop {
            let token = self.tokens.next(LexicalContext::Body, true)?;
            match token.kind {
                TokenKind::Newline => {}
                TokenKind::Eof | TokenKind::Dedent => break,
                TokenKind::Doc | TokenKind::Params | TokenKind::Flags | TokenKind::Len
                    if in_body =>
                {
                    return Err(self.unexpected(
                        &token,
                        &[TokenKind::Command, TokenKind::Dedent],
                    ));
                }
                TokenKind::Doc => {
                    let text = self.rest_of_line()?;
                    if !text.is_empty() {
                        label.doc = Some(match label.doc.take() {
                            Some(doc) => format!("{doc}\n{text}"),
                            None => text,
                        });
                    }
                }
                TokenKind::Params => self.params(&mut label)?,
                TokenKind::Flags => self.flags(&mut label)?,
                TokenKind::Len => {
                    let number = self.expect(LexicalContext::Directive, TokenKind::Number)?;
                    let declared = number.text.parse::<usize>().map_err(|_| {
                        ParseError::LenOutOfRange {
                            text: number.text.clone(),
                            position: self.position(number.offset),
                        }
                    })?;
                    self.end_of_directive()?;
                    label.len = Some(declared);
                }
                TokenKind::Command => {
                    in_body = true;
                    label.body.push(token.text.trim().to_string());
                }
                _ => {
                    return Err(self.unexpected(
                        &token,
                        &[TokenKind::Command, TokenKind::Doc, TokenKind::Dedent],
                    ));
                }
            }
        }

        if let Some(declared) = label.len
            && declared != label.body.len()
        {
            return Err(ParseError::LabelLengthMismatch {
                label: label.name,
                declared,
                actual: label.body.len(),
                position,
            });
        }

        debug!(
            name = %label.name,
            short = ?label.short,
            flags = label.flags.len(),
            params = label.params.len(),
            lines = label.body.len(),
            "label"
        );
        self.model.labels.push(label);
        Ok(())
    }

    // @params: name[,short] [default=<value>] ...
    fn params(&mut self, label: &mut Label) -> Result<(), ParseError> {
        while let Some(name) = self.option_name()? {
            let short = self.option_short()?;
            let default = if self.tokens.peek(LexicalContext::Directive, true)?.kind
                == TokenKind::Default
            {
                self.tokens.next(LexicalContext::Directive, true)?;
                Some(self.default_value()?)
            } else {
                None
            };
            self.check_option(label, &name, short.as_deref())?;
            label.params.push(Param::new(name.text, short, default));
        }
        Ok(())
    }

    // @flags: name[,short] ...
    fn flags(&mut self, label: &mut Label) -> Result<(), ParseError> {
        while let Some(name) = self.option_name()? {
            let short = self.option_short()?;
            self.check_option(label, &name, short.as_deref())?;
            label.flags.push(Flag::new(name.text, short));
        }
        Ok(())
    }

    /// Next option name on a directive line, or `None` at the end of the line.
    fn option_name(&mut self) -> Result<Option<Token>, ParseError> {
        let token = self.tokens.next(LexicalContext::Directive, true)?;
        match token.kind {
            TokenKind::Newline | TokenKind::Eof => Ok(None),
            TokenKind::Identifier => Ok(Some(token)),
            _ => Err(self.unexpected(&token, &[TokenKind::Identifier, TokenKind::Newline])),
        }
    }

    fn option_short(&mut self) -> Result<Option<String>, ParseError> {
        if self.tokens.peek(LexicalContext::Directive, true)?.kind != TokenKind::Comma {
            return Ok(None);
        }
        self.tokens.next(LexicalContext::Directive, true)?;
        let short = self.expect(LexicalContext::Directive, TokenKind::Identifier)?;
        Ok(Some(short.text))
    }

    fn default_value(&mut self) -> Result<String, ParseError> {
        let token = self.tokens.next(LexicalContext::Value, false)?;
        match token.kind {
            TokenKind::String => Ok(unquote(&token.text)),
            TokenKind::Word => Ok(token.text),
            _ => Err(self.unexpected(&token, &[TokenKind::String, TokenKind::Word])),
        }
    }

    fn check_option(
        &self,
        label: &Label,
        name: &Token,
        short: Option<&str>,
    ) -> Result<(), ParseError> {
        let taken: Vec<&str> = label.option_names().collect();
        let clash = std::iter::once(name.text.as_str())
            .chain(short)
            .find(|candidate| taken.contains(candidate))
            .or_else(|| short.filter(|s| *s == name.text));
        match clash {
            Some(clash) => Err(ParseError::DuplicateOption {
                label: label.name.clone(),
                name: clash.to_string(),
                position: self.position(name.offset),
            }),
            None => Ok(()),
        }
    }

    fn rest_of_line(&mut self) -> Result<String, ParseError> {
        let token = self.tokens.next(LexicalContext::Line, true)?;
        match token.kind {
            TokenKind::Text => Ok(token.text.trim().to_string()),
            _ => Ok(String::new()),
        }
    }

    fn end_of_directive(&mut self) -> Result<(), ParseError> {
        let token = self.tokens.next(LexicalContext::Directive, true)?;
        match token.kind {
            TokenKind::Newline | TokenKind::Eof => Ok(()),
            _ => Err(self.unexpected(&token, &[TokenKind::Newline])),
        }
    }

    fn expect(&mut self, context: LexicalContext, kind: TokenKind) -> Result<Token, ParseError> {
        let token = self.tokens.next(context, true)?;
        if token.kind == kind {
            Ok(token)
        } else {
            Err(self.unexpected(&token, &[kind]))
        }
    }

    fn unexpected(&self, token: &Token, expected: &[TokenKind]) -> ParseError {
        ParseError::Syntax {
            expected: expected.to_vec(),
            found: token.kind,
            position: self.position(token.offset),
        }
    }

    fn position(&self, offset: usize) -> Position {
        Position::of(self.tokens.source(), offset)
    }
}

/// Split `name[, alias]:` into its parts.
fn split_label_header(text: &str) -> (String, Option<String>) {
    let text = text.trim_end_matches(':');
    match text.split_once(',') {
        Some((name, short)) => (name.trim().to_string(), Some(short.trim().to_string())),
        None => (text.trim().to_string(), None),
    }
}

/// Strip the surrounding quotes of a string literal and resolve escaped quotes
/// and backslashes. Other backslash sequences are kept as written.
fn unquote(literal: &str) -> String {
    let quote = literal.chars().next().unwrap_or('"');
    let inner = literal
        .strip_prefix(quote)
        .and_then(|s| s.strip_suffix(quote))
        .unwrap_or(literal);

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some(next) if next == quote || next == '\\' => out.push(next),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_split_label_header() {
        assert_eq!(split_label_header("build:"), ("build".to_string(), None));
        assert_eq!(
            split_label_header("build , b :"),
            ("build".to_string(), Some("b".to_string()))
        );
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""hello world""#), "hello world");
        assert_eq!(unquote(r"'it\'s'"), "it's");
        assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unquote(r#""C:\tools\bin""#), r"C:\tools\bin");
        assert_eq!(unquote(r#""a\\b""#), r"a\b");
    }

    #[test]
    fn test_shell_and_scalar_variable() {
        let model = parse_str("shell=cmd\nGREETING=hello\n").unwrap();
        assert_eq!(model.shell, Shell::Cmd);
        assert_eq!(
            model.variable("GREETING"),
            Some(&Value::Scalar("hello".to_string()))
        );
    }

    #[test]
    fn test_sequence_value_trims_trailing_whitespace() {
        let model = parse_str("FILES := a.c \"b c.c\"   \t\nNEXT = x").unwrap();
        assert_eq!(
            model.variable("FILES"),
            Some(&Value::Sequence(vec!["a.c".to_string(), "b c.c".to_string()]))
        );
        assert_eq!(model.variable("NEXT"), Some(&Value::Scalar("x".to_string())));
    }

    #[test]
    fn test_value_stops_at_comment() {
        let model = parse_str("OUT = build/ # where artifacts go\n").unwrap();
        assert_eq!(model.variable("OUT"), Some(&Value::Scalar("build/".to_string())));
    }

    #[test]
    fn test_empty_value_is_an_error() {
        let err = parse_str("EMPTY =   # nothing\n").unwrap_err();
        assert!(matches!(err, ParseError::EmptyValue { ref name, .. } if name == "EMPTY"));
    }

    #[test]
    fn test_label_headers_and_body() {
        let input = r#"
shell := sh

build, b:
  @doc: Compile the project
  @params: target,t default=debug jobs,j
  @flags: release,r verbose
  @len: 2
  # comments are not commands
  echo building $$target

  cargo build
"#;
        let model = parse_str(input).unwrap();
        let label = model.find_label("b").unwrap();
        assert_eq!(label.name, "build");
        assert_eq!(label.doc.as_deref(), Some("Compile the project"));
        assert_eq!(label.params.len(), 2);
        assert_eq!(label.params[0].name, "target");
        assert_eq!(label.params[0].short.as_deref(), Some("t"));
        assert_eq!(label.params[0].default.as_deref(), Some("debug"));
        assert_eq!(label.params[1].default, None);
        assert_eq!(label.flags.len(), 2);
        assert_eq!(label.flags[1].name, "verbose");
        assert!(!label.flags[0].present);
        assert_eq!(label.len, Some(2));
        assert_eq!(label.body, vec!["echo building $$target", "cargo build"]);
    }

    #[test]
    fn test_quoted_default_value() {
        let input = "greet:\n  @params: name default=\"big world\"\n  echo $$name\n";
        let model = parse_str(input).unwrap();
        assert_eq!(
            model.labels[0].params[0].default.as_deref(),
            Some("big world")
        );
    }

    #[test]
    fn test_directive_keywords_ignore_case() {
        let model = parse_str("test:\n  @DOC: upper\n  @Flags: quick\n  run\n").unwrap();
        assert_eq!(model.labels[0].doc.as_deref(), Some("upper"));
        assert_eq!(model.labels[0].flags[0].name, "quick");
    }

    #[test]
    fn test_labels_end_at_unindented_lines() {
        let input = "one-a:\n  echo 1\nVAR = x\ntwo-b:\n  echo 2\n";
        let model = parse_str(input).unwrap();
        assert_eq!(model.labels.len(), 2);
        assert_eq!(model.labels[0].body, vec!["echo 1"]);
        assert_eq!(model.labels[1].body, vec!["echo 2"]);
        assert_eq!(model.variables.len(), 1);
    }

    #[test]
    fn test_empty_doc_lines_are_skipped() {
        let model = parse_str("one-a:\n  @doc:\n  true\nrun-it:\n  @doc:   \n  @doc: runs\n  true\n").unwrap();
        assert_eq!(model.labels[0].doc, None);
        assert_eq!(model.labels[1].doc.as_deref(), Some("runs"));
    }

    #[test]
    fn test_len_out_of_range() {
        let err = parse_str("big:\n  @len: 99999999999999999999999\n  true\n").unwrap_err();
        assert!(matches!(err, ParseError::LenOutOfRange { ref text, .. } if text == "99999999999999999999999"));
        assert!(err.to_string().contains("too large"));
    }

    #[test]
    fn test_unterminated_quote_is_an_error() {
        let err = parse_str("VAR = \"oops\n").unwrap_err();
        assert!(matches!(err, ParseError::Lex(ref lex) if lex.offset == 6));

        let err = parse_str("greet:\n  @params: name default='oops\n  true\n").unwrap_err();
        assert!(matches!(err, ParseError::Lex(_)));
    }

    #[test]
    fn test_directive_after_command_is_rejected() {
        let err = parse_str("build:\n  echo hi\n  @doc: late\n").unwrap_err();
        assert!(matches!(
            err,
            ParseError::Syntax {
                found: TokenKind::Doc,
                ..
            }
        ));
    }

    #[test]
    fn test_unsupported_shell() {
        let err = parse_str("shell := fish\n").unwrap_err();
        assert!(matches!(err, ParseError::UnsupportedShell { ref name, .. } if name == "fish"));
    }

    #[test]
    fn test_second_shell_declaration() {
        let err = parse_str("shell := sh\nshell := bash\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateShell { .. }));
    }

    #[test]
    fn test_duplicate_variable() {
        let err = parse_str("A = 1\nA = 2\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateVariable { ref name, .. } if name == "A"));
    }

    #[test]
    fn test_duplicate_option_within_label() {
        let err = parse_str("build:\n  @flags: fast,f\n  @params: force,f\n  go\n").unwrap_err();
        assert!(matches!(err, ParseError::DuplicateOption { ref name, .. } if name == "f"));
    }

    #[test]
    fn test_missing_assign_reports_syntax_error() {
        let err = parse_str("GREETING hello").unwrap_err();
        match err {
            ParseError::Syntax {
                expected,
                found,
                position,
            } => {
                assert_eq!(expected, vec![TokenKind::Assign]);
                assert_eq!(found, TokenKind::Identifier);
                assert_eq!(position, Position { line: 1, column: 10 });
            }
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    #[test]
    fn test_default_shell_when_undeclared() {
        let model = parse_str("lint:\n  true\n").unwrap();
        assert_eq!(model.shell, Shell::platform_default());
    }
}
