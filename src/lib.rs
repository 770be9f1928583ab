//! # wake
//!
//! A minimal make alternative. A wakefile declares a shell, some variables and a
//! set of labels; each label has a body of shell lines plus optional `@doc`,
//! `@params`, `@flags` and `@len` directives. `wake <label> [args]` binds the
//! arguments to the label's options and runs the body line by line.

pub mod ast;
pub mod binder;
pub mod cli;
pub mod config;
pub mod executor;
pub mod interpreter;
pub mod interrupt;
pub mod parser;

pub use ast::{Flag, Label, Model, Param, Shell, Value};
pub use binder::{BindError, ResolvedLabel, bind};
pub use config::ConfigError;
pub use interpreter::{Engine, Environ, ExecError, RunState};
pub use parser::{ParseError, Parser, parse_str};

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{}", parser::render(.source, .text, Some(.file.as_str())))]
    Parse {
        file: String,
        text: String,
        #[source]
        source: ParseError,
    },

    #[error("`{}` defines no labels", .file.display())]
    NoLabels { file: PathBuf },

    #[error("no label named `{name}` (available: {})", .available.join(", "))]
    LabelNotFound { name: String, available: Vec<String> },

    #[error("no label given; run with --list to see the available labels")]
    MissingLabel,

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Process exit code for this error. Only execution failures carry their own.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Exec(err) => err.exit_code(),
            _ => 1,
        }
    }

    /// Whether the message is already a complete diagnostic.
    #[must_use]
    pub fn is_rendered(&self) -> bool {
        matches!(self, Error::Parse { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
