//! Pipeline glue used by the CLI: load, parse, look up, bind and run.

use crate::ast::{Label, Model, Shell, Value};
use crate::interpreter::Engine;
use crate::{Error, Result, binder, config, interrupt, parser};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// How a label should be run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Explicit wakefile path; discovery is used when `None`.
    pub file: Option<PathBuf>,
    /// Print the substituted lines instead of running them.
    pub dry_run: bool,
    /// Deadline for each command line.
    pub timeout: Option<Duration>,
}

/// A parsed wakefile together with where it came from.
#[derive(Debug)]
pub struct Loaded {
    pub path: PathBuf,
    pub model: Model,
}

/// Find, read and parse the wakefile.
///
/// # Errors
///
/// Returns [`Error::Config`] if the file cannot be found or read and
/// [`Error::Parse`] if it is not a valid wakefile.
pub fn load_model(file: Option<&std::path::Path>) -> Result<Loaded> {
    let wakefile = config::load(file)?;
    let model = parser::parse_str(&wakefile.contents).map_err(|source| Error::Parse {
        file: wakefile.display_name(),
        text: wakefile.contents.clone(),
        source,
    })?;
    debug!(
        path = %wakefile.path.display(),
        labels = model.labels.len(),
        variables = model.variables.len(),
        shell = %model.shell,
        "wakefile parsed"
    );
    Ok(Loaded {
        path: wakefile.path,
        model,
    })
}

/// Run `name` from the wakefile with `args` bound to its options.
///
/// # Errors
///
/// Returns an error if the wakefile cannot be loaded, the label does not
/// exist, the arguments do not bind, or a command line fails.
pub fn run_label(name: &str, args: &[String], options: &RunOptions) -> Result<()> {
    let Loaded { path, model } = load_model(options.file.as_deref())?;
    if model.labels.is_empty() {
        return Err(Error::NoLabels { file: path });
    }
    let label = model
        .find_label(name)
        .ok_or_else(|| Error::LabelNotFound {
            name: name.to_string(),
            available: model.labels.iter().map(|l| l.name.clone()).collect(),
        })?;
    let resolved = binder::bind(label, args)?;
    let environ = config::environ();

    let mut engine = Engine::new(&model).with_interrupt(interrupt::flag());
    if let Some(timeout) = options.timeout {
        engine = engine.with_timeout(timeout);
    }

    if options.dry_run {
        for line in engine.plan(&resolved, &environ)? {
            println!("{line}");
        }
        return Ok(());
    }

    info!(label = %resolved.name, lines = resolved.body.len(), "running label");
    engine.run(&resolved, &environ)?;
    Ok(())
}

fn option_heading(name: &str, short: Option<&str>) -> String {
    match short {
        Some(short) => format!("--{name}, -{short}"),
        None => format!("--{name}"),
    }
}

/// Human-readable listing of every label, its alias, doc and options.
#[must_use]
pub fn format_labels(model: &Model) -> String {
    if model.labels.is_empty() {
        return "No labels defined.\n".to_string();
    }
    let mut out = String::from("Available labels:\n");
    for label in &model.labels {
        let _ = match &label.short {
            Some(short) => writeln!(out, "  {} ({short})", label.name),
            None => writeln!(out, "  {}", label.name),
        };
        if let Some(doc) = &label.doc {
            let _ = writeln!(out, "      {doc}");
        }
        for flag in &label.flags {
            let _ = writeln!(out, "      {}", option_heading(&flag.name, flag.short.as_deref()));
        }
        for param in &label.params {
            let heading = option_heading(&param.name, param.short.as_deref());
            let _ = match &param.default {
                Some(default) => writeln!(out, "      {heading} <value> [default: {default}]"),
                None => writeln!(out, "      {heading} <value>"),
            };
        }
    }
    out
}

/// Print the label listing for `--list`.
///
/// # Errors
///
/// Returns an error if the wakefile cannot be loaded.
pub fn list_labels(file: Option<&std::path::Path>) -> Result<()> {
    let Loaded { model, .. } = load_model(file)?;
    print!("{}", format_labels(&model));
    Ok(())
}

#[derive(Serialize)]
struct InspectVariable<'a> {
    name: &'a str,
    value: &'a Value,
}

/// JSON view of a parsed wakefile.
#[derive(Serialize)]
struct Inspection<'a> {
    file: String,
    shell: Shell,
    variables: Vec<InspectVariable<'a>>,
    labels: &'a [Label],
}

/// Render the wakefile as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn inspect_json(loaded: &Loaded) -> Result<String> {
    let inspection = Inspection {
        file: loaded.path.display().to_string(),
        shell: loaded.model.shell,
        variables: loaded
            .model
            .variables
            .iter()
            .map(|(name, value)| InspectVariable { name, value })
            .collect(),
        labels: &loaded.model.labels,
    };
    Ok(serde_json::to_string_pretty(&inspection)?)
}

/// Print the wakefile as JSON for `--inspect`.
///
/// # Errors
///
/// Returns an error if the wakefile cannot be loaded or serialized.
pub fn inspect(file: Option<&std::path::Path>) -> Result<()> {
    let loaded = load_model(file)?;
    println!("{}", inspect_json(&loaded)?);
    Ok(())
}
