//! Context-driven regex tokenizer
//!
//! The tokenizer owns only the source text and a cursor. Every call to
//! [`Tokenizer::next`] names the [`LexicalContext`] to lex with, so the parser can
//! switch between the top-level grammar and the whitespace-sensitive value grammar
//! at the same position.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::trace;

/// Characters of context kept on each side of a lexing failure.
const ERROR_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Whitespace,
    Newline,
    Comment,
    String,
    Number,
    Word,
    Identifier,
    Label,
    Assign,
    Comma,
    Default,
    Shell,
    Params,
    Flags,
    Doc,
    Len,
    Text,
    Command,
    /// Zero-width marker for a line starting at column 0 inside a label body.
    Dedent,
    Eof,
}

impl TokenKind {
    /// Kinds skipped unless the caller asks to observe whitespace.
    #[must_use]
    pub fn is_trivia(self) -> bool {
        matches!(self, TokenKind::Whitespace | TokenKind::Comment)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TokenKind::Whitespace => "whitespace",
            TokenKind::Newline => "end of line",
            TokenKind::Comment => "comment",
            TokenKind::String => "quoted string",
            TokenKind::Number => "number",
            TokenKind::Word => "word",
            TokenKind::Identifier => "identifier",
            TokenKind::Label => "label header (`name:`)",
            TokenKind::Assign => "`=` or `:=`",
            TokenKind::Comma => "`,`",
            TokenKind::Default => "`default=`",
            TokenKind::Shell => "`shell`",
            TokenKind::Params => "`@params:`",
            TokenKind::Flags => "`@flags:`",
            TokenKind::Doc => "`@doc:`",
            TokenKind::Len => "`@len`",
            TokenKind::Text => "text",
            TokenKind::Command => "command line",
            TokenKind::Dedent => "unindented line",
            TokenKind::Eof => "end of input",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// Byte offset of the token in the source.
    pub offset: usize,
}

impl Token {
    fn eof(offset: usize) -> Self {
        Self {
            kind: TokenKind::Eof,
            text: String::new(),
            offset,
        }
    }
}

/// 1-indexed line and column of a byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    #[must_use]
    pub fn of(source: &str, offset: usize) -> Self {
        let offset = offset.min(source.len());
        let before = source.get(..offset).unwrap_or(source);
        let line = before.matches('\n').count() + 1;
        let line_start = before.rfind('\n').map_or(0, |i| i + 1);
        let column = before[line_start..].chars().count() + 1;
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// No pattern of the active context matched at `offset`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unexpected input at offset {offset}: `{before}` here --> `{after}`")]
pub struct LexError {
    pub offset: usize,
    pub before: String,
    pub after: String,
    pub context: LexicalContext,
}

impl LexError {
    /// Whether the failure looks like a malformed label header: top level, with
    /// at most one word before it on its line, or right before a `:`.
    #[must_use]
    pub fn at_label_header(&self) -> bool {
        if self.context != LexicalContext::Model {
            return false;
        }
        let line = self.before.rsplit('\n').next().unwrap_or_default().trim();
        line.is_empty() || (self.after.starts_with(':') && !line.contains(char::is_whitespace))
    }
}

/// Which token table to lex with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexicalContext {
    /// Top level: shell declaration, variable names, label headers.
    Model,
    /// Right-hand side of a variable assignment.
    Value,
    /// Arguments of `@params:`, `@flags:` and `@len`.
    Directive,
    /// Free text to the end of the line (`@doc:`).
    Line,
    /// Start of a line inside a label.
    Body,
}

struct Rule {
    kind: TokenKind,
    pattern: Regex,
}

impl Rule {
    /// Length of the input this rule consumes, honouring a `tok` group if present.
    fn match_len(&self, input: &str) -> Option<usize> {
        let caps = self.pattern.captures(input)?;
        let len = caps.name("tok").or_else(|| caps.get(0))?.end();
        (len > 0 || self.kind == TokenKind::Dedent).then_some(len)
    }
}

#[allow(clippy::expect_used)]
fn rule(kind: TokenKind, pattern: &str) -> Rule {
    Rule {
        kind,
        pattern: Regex::new(&format!("^(?:{pattern})")).expect("token pattern must compile"),
    }
}

const ANY_WS: &str = r"\s+";
const INLINE_WS: &str = r"[^\S\n]+";
const NEWLINE: &str = r"\r?\n";
const COMMENT: &str = r"#[^\n]*";
const STRING: &str = r#""(?:[^"\\\n]|\\.)*"|'(?:[^'\\\n]|\\.)*'"#;
// A quote can only open a string, so an unterminated one fails to lex.
const WORD: &str = r#"[^\s#"'][^\s#]*"#;
const VAR_NAME: &str = r"[A-Za-z_][A-Za-z0-9_]*";
const OPTION_NAME: &str = r"[A-Za-z_][A-Za-z0-9_-]*";
// Lowercase, at least two characters, no leading/trailing digit, `_` or `-`.
// An optional `, alias` follows, and the trailing `:` must not start `:=`.
const LABEL: &str =
    r"(?P<tok>[a-z][a-z0-9_-]*[a-z](?:[ \t]*,[ \t]*[a-z][a-z0-9_-]*)?[ \t]*:)(?:[^=]|$)";

static MODEL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(TokenKind::Whitespace, ANY_WS),
        rule(TokenKind::Comment, COMMENT),
        rule(TokenKind::Assign, r":?="),
        rule(TokenKind::Shell, r"(?i)(?P<tok>shell)[ \t]*:?="),
        rule(TokenKind::Label, LABEL),
        rule(TokenKind::Identifier, VAR_NAME),
    ]
});

static VALUE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(TokenKind::Comment, COMMENT),
        rule(TokenKind::Whitespace, INLINE_WS),
        rule(TokenKind::Newline, NEWLINE),
        rule(TokenKind::String, STRING),
        rule(TokenKind::Word, WORD),
    ]
});

static DIRECTIVE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(TokenKind::Whitespace, INLINE_WS),
        rule(TokenKind::Comment, COMMENT),
        rule(TokenKind::Newline, NEWLINE),
        rule(TokenKind::Default, r"(?i)default="),
        rule(TokenKind::Comma, ","),
        rule(TokenKind::Number, r"(?P<tok>\d+)(?:[\s#]|$)"),
        rule(TokenKind::Identifier, OPTION_NAME),
    ]
});

static LINE_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(TokenKind::Whitespace, INLINE_WS),
        rule(TokenKind::Newline, NEWLINE),
        rule(TokenKind::Text, r"[^\n]+"),
    ]
});

static BODY_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        rule(TokenKind::Newline, NEWLINE),
        rule(TokenKind::Comment, r"[ \t]*#[^\n]*"),
        rule(TokenKind::Params, r"(?i)[ \t]+@params:"),
        rule(TokenKind::Flags, r"(?i)[ \t]+@flags:"),
        rule(TokenKind::Doc, r"(?i)[ \t]+@doc:"),
        rule(TokenKind::Len, r"(?i)[ \t]+@len\b:?"),
        rule(TokenKind::Command, r"[ \t]+[^\s#][^\n]*"),
        rule(TokenKind::Whitespace, INLINE_WS),
        rule(TokenKind::Dedent, r"(?P<tok>)\S"),
    ]
});

impl LexicalContext {
    fn rules(self) -> &'static [Rule] {
        match self {
            LexicalContext::Model => &MODEL_RULES,
            LexicalContext::Value => &VALUE_RULES,
            LexicalContext::Directive => &DIRECTIVE_RULES,
            LexicalContext::Line => &LINE_RULES,
            LexicalContext::Body => &BODY_RULES,
        }
    }
}

pub struct Tokenizer<'a> {
    text: &'a str,
    cursor: usize,
}

impl<'a> Tokenizer<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self { text, cursor: 0 }
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn source(&self) -> &'a str {
        self.text
    }

    /// Lex the next token using `context`'s table; first matching rule wins.
    ///
    /// With `ignore_ws` set, whitespace and comments are consumed silently.
    /// At the end of input an `Eof` token is returned, repeatably.
    ///
    /// # Errors
    ///
    /// Returns [`LexError`] when no rule of `context` matches at the cursor.
    pub fn next(&mut self, context: LexicalContext, ignore_ws: bool) -> Result<Token, LexError> {
        loop {
            if self.cursor >= self.text.len() {
                return Ok(Token::eof(self.text.len()));
            }
            let rest = &self.text[self.cursor..];
            let Some((kind, len)) = context
                .rules()
                .iter()
                .find_map(|rule| rule.match_len(rest).map(|len| (rule.kind, len)))
            else {
                return Err(self.error(context));
            };

            let token = Token {
                kind,
                text: rest[..len].to_string(),
                offset: self.cursor,
            };
            self.cursor += len;

            if ignore_ws && kind.is_trivia() {
                continue;
            }
            trace!(?context, ?kind, text = %token.text, offset = token.offset, "token");
            return Ok(token);
        }
    }

    /// Look at the next token without consuming it.
    ///
    /// # Errors
    ///
    /// Same as [`Tokenizer::next`].
    pub fn peek(&mut self, context: LexicalContext, ignore_ws: bool) -> Result<Token, LexError> {
        let saved = self.cursor;
        let token = self.next(context, ignore_ws);
        self.cursor = saved;
        token
    }

    /// Lazily lex with a fixed context, skipping trivia, until end of input or the
    /// first error. A zero-width token ends the sequence after being yielded.
    pub fn iter(
        &mut self,
        context: LexicalContext,
    ) -> impl Iterator<Item = Result<Token, LexError>> + '_ {
        let mut done = false;
        std::iter::from_fn(move || {
            if done {
                return None;
            }
            match self.next(context, true) {
                Ok(token) if token.kind == TokenKind::Eof => None,
                Ok(token) => {
                    done = token.text.is_empty();
                    Some(Ok(token))
                }
                Err(err) => {
                    done = true;
                    Some(Err(err))
                }
            }
        })
    }

    fn error(&self, context: LexicalContext) -> LexError {
        let before: String = {
            let head = &self.text[..self.cursor];
            let skip = head.chars().count().saturating_sub(ERROR_WINDOW);
            head.chars().skip(skip).collect()
        };
        let after: String = self.text[self.cursor..].chars().take(ERROR_WINDOW).collect();
        LexError {
            offset: self.cursor,
            before,
            after,
            context,
        }
    }
}
