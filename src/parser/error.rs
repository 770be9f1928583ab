//! Parse error types and their human-readable rendering.

use super::tokenizer::{LexError, LexicalContext, Position, TokenKind};

/// First grammar violation found while parsing a wakefile.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {}, found {found} at {position}", one_of(.expected))]
    Syntax {
        expected: Vec<TokenKind>,
        found: TokenKind,
        position: Position,
    },

    #[error("unsupported shell `{name}` at {position}")]
    UnsupportedShell { name: String, position: Position },

    #[error("variable `{name}` has an empty value at {position}")]
    EmptyValue { name: String, position: Position },

    #[error("@len value `{text}` at {position} is too large")]
    LenOutOfRange { text: String, position: Position },

    #[error("label `{label}` declares @len {declared} but has {actual} command line(s)")]
    LabelLengthMismatch {
        label: String,
        declared: usize,
        actual: usize,
        position: Position,
    },

    #[error("label `{name}` at {position} is already defined")]
    DuplicateLabel { name: String, position: Position },

    #[error("variable `{name}` at {position} is already defined")]
    DuplicateVariable { name: String, position: Position },

    #[error("label `{label}` declares option `{name}` twice at {position}")]
    DuplicateOption {
        label: String,
        name: String,
        position: Position,
    },

    #[error("shell is declared a second time at {position}")]
    DuplicateShell { position: Position },
}

fn one_of(expected: &[TokenKind]) -> String {
    let names: Vec<String> = expected.iter().map(ToString::to_string).collect();
    match names.as_slice() {
        [] => "nothing".to_string(),
        [single] => single.clone(),
        [rest @ .., last] => format!("{} or {last}", rest.join(", ")),
    }
}

impl ParseError {
    /// Where in the source the error points.
    #[must_use]
    pub fn position(&self, source: &str) -> Position {
        match self {
            ParseError::Lex(err) => Position::of(source, err.offset),
            ParseError::Syntax { position, .. }
            | ParseError::UnsupportedShell { position, .. }
            | ParseError::EmptyValue { position, .. }
            | ParseError::LenOutOfRange { position, .. }
            | ParseError::LabelLengthMismatch { position, .. }
            | ParseError::DuplicateLabel { position, .. }
            | ParseError::DuplicateVariable { position, .. }
            | ParseError::DuplicateOption { position, .. }
            | ParseError::DuplicateShell { position } => *position,
        }
    }

    /// A suggestion for fixing the error, when there is an obvious one.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            ParseError::Lex(err) if err.at_label_header() => Some(
                "Label names are lowercase, at least two characters long, and end with a letter \
                 (e.g. `build:` or `run-tests, t:`)."
                    .to_string(),
            ),
            ParseError::Lex(err)
                if err.context == LexicalContext::Value
                    && err.after.starts_with(['"', '\'']) =>
            {
                Some("Quoted values must be closed on the same line.".to_string())
            }
            ParseError::Syntax { expected, .. } if expected.contains(&TokenKind::Assign) => Some(
                "Variables are assigned with `NAME = value` or `NAME := value`.".to_string(),
            ),
            ParseError::UnsupportedShell { .. } => {
                let names: Vec<&str> = crate::ast::Shell::ALL.iter().map(|s| s.name()).collect();
                Some(format!("Supported shells: {}.", names.join(", ")))
            }
            ParseError::LabelLengthMismatch { .. } => Some(
                "`@len` must equal the number of command lines in the label body.".to_string(),
            ),
            _ => None,
        }
    }
}

/// Render `err` with the offending source line and a caret under the column.
///
/// ```text
/// error: <message>
///   --> wakefile:3:5
///     |
///   3 | <source line>
///     |     ^
/// ```
#[must_use]
pub fn render(err: &ParseError, source: &str, filename: Option<&str>) -> String {
    let position = err.position(source);
    let location = match filename {
        Some(name) => format!("{name}:{position}"),
        None => position.to_string(),
    };
    let mut lines = vec![format!("error: {err}"), format!("  --> {location}")];

    if let Some(line) = source.lines().nth(position.line.saturating_sub(1)) {
        let num = position.line.to_string();
        let pad = " ".repeat(num.len());
        let caret = " ".repeat(position.column.saturating_sub(1));
        lines.push(format!("   {pad} |"));
        lines.push(format!("   {num} | {}", line.trim_end()));
        lines.push(format!("   {pad} | {caret}^"));
    }

    if let Some(hint) = err.hint() {
        lines.push(String::new());
        lines.push(format!("   = hint: {hint}"));
    }
    lines.join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::parser::parse_str;

    #[test]
    fn test_render_includes_location_source_and_caret() {
        let source = "shell := sh\nGREETING hello\n";
        let err = parse_str(source).unwrap_err();
        let rendered = render(&err, source, Some("wakefile"));
        assert!(rendered.starts_with("error: "), "{rendered}");
        assert!(rendered.contains("--> wakefile:"), "{rendered}");
        assert!(rendered.contains("2 | GREETING hello"), "{rendered}");
        assert!(rendered.contains('^'), "{rendered}");
    }

    #[test]
    fn test_render_without_filename() {
        let source = "shell := zsh\n";
        let err = parse_str(source).unwrap_err();
        let rendered = render(&err, source, None);
        assert!(rendered.contains("--> 1:10"), "{rendered}");
        assert!(rendered.contains("hint: Supported shells"), "{rendered}");
    }

    #[test]
    fn test_label_hint_only_for_malformed_headers() {
        let err = parse_str("Build:\n  true\n").unwrap_err();
        assert!(err.hint().unwrap().starts_with("Label names are lowercase"));

        let err = parse_str("VAR = \"oops\n").unwrap_err();
        assert_eq!(
            err.hint().as_deref(),
            Some("Quoted values must be closed on the same line.")
        );

        let err = parse_str("build:\n  @flags: !bad\n  true\n").unwrap_err();
        assert!(matches!(err, ParseError::Lex(_)));
        assert_eq!(err.hint(), None);
    }

    #[test]
    fn test_expected_list_wording() {
        assert_eq!(one_of(&[TokenKind::Assign]), "`=` or `:=`");
        assert_eq!(
            one_of(&[TokenKind::Shell, TokenKind::Identifier, TokenKind::Label]),
            "`shell`, identifier or label header (`name:`)"
        );
    }
}
