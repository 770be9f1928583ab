//! Parsed wakefile model
//!
//! A [`Model`] is built once by the parser and treated as read-only afterwards.
//! Binding produces a [`ResolvedLabel`](crate::binder::ResolvedLabel) copy instead
//! of touching the labels stored here.

use serde::Serialize;
use std::fmt;

/// Shells a wakefile may select with `shell := <name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shell {
    Cmd,
    Powershell,
    Pwsh,
    Sh,
    Bash,
}

impl Shell {
    pub const ALL: [Shell; 5] = [
        Shell::Cmd,
        Shell::Powershell,
        Shell::Pwsh,
        Shell::Sh,
        Shell::Bash,
    ];

    /// Look up a shell by name, ignoring case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|shell| shell.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Shell::Cmd => "cmd",
            Shell::Powershell => "powershell",
            Shell::Pwsh => "pwsh",
            Shell::Sh => "sh",
            Shell::Bash => "bash",
        }
    }

    /// Shell used when a wakefile does not declare one.
    #[must_use]
    pub fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            Shell::Cmd
        } else {
            Shell::Sh
        }
    }
}

impl fmt::Display for Shell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A variable value: one token stays a scalar, several tokens form a sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Scalar(String),
    Sequence(Vec<String>),
}

impl Value {
    /// Build a value from the tokens that contributed to it.
    ///
    /// Returns `None` when no token contributed.
    #[must_use]
    pub fn from_parts(mut parts: Vec<String>) -> Option<Self> {
        match parts.len() {
            0 => None,
            1 => parts.pop().map(Value::Scalar),
            _ => Some(Value::Sequence(parts)),
        }
    }

    /// The string substituted into command lines and exported to the environment.
    #[must_use]
    pub fn render(&self) -> String {
        match self {
            Value::Scalar(s) => s.clone(),
            Value::Sequence(items) => items.join(" "),
        }
    }
}

/// Boolean switch declared with `@flags:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flag {
    pub name: String,
    pub short: Option<String>,
    pub present: bool,
}

impl Flag {
    #[must_use]
    pub fn new(name: impl Into<String>, short: Option<String>) -> Self {
        Self {
            name: name.into(),
            short,
            present: false,
        }
    }
}

/// Value-carrying option declared with `@params:`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    pub short: Option<String>,
    pub values: Vec<String>,
    pub default: Option<String>,
    pub bound: bool,
}

impl Param {
    #[must_use]
    pub fn new(name: impl Into<String>, short: Option<String>, default: Option<String>) -> Self {
        Self {
            name: name.into(),
            short,
            values: Vec::new(),
            default,
            bound: false,
        }
    }
}

/// Anything a CLI argument can name: `--name` or `-short`.
pub trait Named {
    fn name(&self) -> &str;
    fn short(&self) -> Option<&str>;

    /// Whether `arg` is this option's long (`--name`) or short (`-s`) form.
    fn matches_arg(&self, arg: &str) -> bool {
        if let Some(long) = arg.strip_prefix("--") {
            return long == self.name();
        }
        match (arg.strip_prefix('-'), self.short()) {
            (Some(short), Some(declared)) => short == declared,
            _ => false,
        }
    }
}

impl Named for Flag {
    fn name(&self) -> &str {
        &self.name
    }

    fn short(&self) -> Option<&str> {
        self.short.as_deref()
    }
}

impl Named for Param {
    fn name(&self) -> &str {
        &self.name
    }

    fn short(&self) -> Option<&str> {
        self.short.as_deref()
    }
}

/// A named build target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Label {
    pub name: String,
    pub short: Option<String>,
    pub flags: Vec<Flag>,
    pub params: Vec<Param>,
    pub doc: Option<String>,
    /// Declared `@len`, checked against `body` at parse time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<usize>,
    /// Raw command lines, unsubstituted.
    pub body: Vec<String>,
}

impl Label {
    #[must_use]
    pub fn new(name: impl Into<String>, short: Option<String>) -> Self {
        Self {
            name: name.into(),
            short,
            flags: Vec::new(),
            params: Vec::new(),
            doc: None,
            len: None,
            body: Vec::new(),
        }
    }

    /// Whether this label answers to `name` either by its name or its alias.
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.short.as_deref() == Some(name)
    }

    /// Every name and alias the label's flags and params can be called by.
    pub fn option_names(&self) -> impl Iterator<Item = &str> {
        let flags = self
            .flags
            .iter()
            .flat_map(|f| std::iter::once(f.name.as_str()).chain(f.short.as_deref()));
        let params = self
            .params
            .iter()
            .flat_map(|p| std::iter::once(p.name.as_str()).chain(p.short.as_deref()));
        flags.chain(params)
    }
}

/// Ordered variable table; insertion order is the wakefile order.
pub type Variables = Vec<(String, Value)>;

/// The parsed wakefile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Model {
    pub shell: Shell,
    pub variables: Variables,
    pub labels: Vec<Label>,
}

impl Default for Model {
    fn default() -> Self {
        Self {
            shell: Shell::platform_default(),
            variables: Vec::new(),
            labels: Vec::new(),
        }
    }
}

impl Model {
    /// Find a label by name or short alias.
    #[must_use]
    pub fn find_label(&self, name: &str) -> Option<&Label> {
        self.labels.iter().find(|label| label.answers_to(name))
    }

    #[must_use]
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables
            .iter()
            .find_map(|(key, value)| (key == name).then_some(value))
    }
}
