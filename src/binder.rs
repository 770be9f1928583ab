//! Binding CLI arguments to a label's declared flags and params.

use crate::ast::{Flag, Label, Named, Param};
use std::ops::Deref;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("unknown argument `{argument}` for label `{label}`")]
    UnknownArgument { argument: String, label: String },

    #[error("param `{param}` of label `{label}` expects a value")]
    MissingValue { param: String, label: String },
}

/// A label copy whose flags and params carry their final values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLabel {
    label: Label,
}

/// What a `$$NAME` reference resolves to within a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    Value(String),
    /// A declared param with neither a CLI value nor a default.
    Unbound,
}

impl Param {
    /// CLI values joined by a space, else the default.
    #[must_use]
    pub fn resolved_value(&self) -> Option<String> {
        if self.bound {
            Some(self.values.join(" "))
        } else {
            self.default.clone()
        }
    }
}

impl Flag {
    #[must_use]
    pub fn resolved_value(&self) -> String {
        self.present.to_string()
    }
}

impl ResolvedLabel {
    #[must_use]
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Resolve a reference against the label's params, then its flags.
    ///
    /// Returns `None` when the label declares nothing by that name.
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<Binding> {
        if let Some(param) = self.label.params.iter().find(|p| p.name == name) {
            return Some(
                param
                    .resolved_value()
                    .map_or(Binding::Unbound, Binding::Value),
            );
        }
        self.label
            .flags
            .iter()
            .find(|f| f.name == name)
            .map(|f| Binding::Value(f.resolved_value()))
    }
}

impl Deref for ResolvedLabel {
    type Target = Label;

    fn deref(&self) -> &Label {
        &self.label
    }
}

/// Bind `args` (everything after the label name) to `label`'s flags and params.
///
/// Flags take no value; params consume the next argument and may repeat.
/// Every argument must name a declared flag or param.
///
/// # Errors
///
/// Returns [`BindError::UnknownArgument`] for an argument matching no declared
/// option and [`BindError::MissingValue`] for a param given as the last argument.
pub fn bind(label: &Label, args: &[String]) -> Result<ResolvedLabel, BindError> {
    let mut resolved = label.clone();
    let mut args = args.iter();

    while let Some(arg) = args.next() {
        if let Some(flag) = resolved.flags.iter_mut().find(|f| f.matches_arg(arg)) {
            flag.present = true;
            continue;
        }
        if let Some(param) = resolved.params.iter_mut().find(|p| p.matches_arg(arg)) {
            let value = args.next().ok_or_else(|| BindError::MissingValue {
                param: param.name.clone(),
                label: label.name.clone(),
            })?;
            param.values.push(value.clone());
            param.bound = true;
            continue;
        }
        return Err(BindError::UnknownArgument {
            argument: arg.clone(),
            label: label.name.clone(),
        });
    }

    for param in &resolved.params {
        debug!(
            label = %resolved.name,
            param = %param.name,
            bound = param.bound,
            value = ?param.resolved_value(),
            "param binding"
        );
    }
    for flag in &resolved.flags {
        debug!(label = %resolved.name, flag = %flag.name, present = flag.present, "flag binding");
    }

    Ok(ResolvedLabel { label: resolved })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    fn label() -> Label {
        let mut label = Label::new("build", Some("b".to_string()));
        label.flags.push(Flag::new("release", Some("r".to_string())));
        label
            .params
            .push(Param::new("target", Some("t".to_string()), Some("debug".to_string())));
        label.params.push(Param::new("feature", None, None));
        label
    }

    #[test]
    fn test_no_args_uses_defaults() {
        let resolved = bind(&label(), &[]).unwrap();
        assert_eq!(resolved.binding("target"), Some(Binding::Value("debug".into())));
        assert_eq!(resolved.binding("feature"), Some(Binding::Unbound));
        assert_eq!(resolved.binding("release"), Some(Binding::Value("false".into())));
        assert_eq!(resolved.binding("missing"), None);
    }

    #[test]
    fn test_default_leaves_param_unbound() {
        let resolved = bind(&label(), &[]).unwrap();
        let target = &resolved.params[0];
        assert!(!target.bound);
        assert!(target.values.is_empty());
        assert_eq!(target.resolved_value().as_deref(), Some("debug"));
        assert_eq!(resolved.params[1].resolved_value(), None);
    }

    #[test]
    fn test_flags_and_params_in_any_order() {
        let resolved = bind(&label(), &args(&["-t", "x86", "--release"])).unwrap();
        assert!(resolved.flags[0].present);
        assert!(resolved.params[0].bound);
        assert_eq!(resolved.params[0].values, vec!["x86"]);
        assert_eq!(resolved.binding("release"), Some(Binding::Value("true".into())));
    }

    #[test]
    fn test_repeated_param_accumulates() {
        let resolved = bind(
            &label(),
            &args(&["--feature", "serde", "--feature", "tracing"]),
        )
        .unwrap();
        assert_eq!(resolved.params[1].values, vec!["serde", "tracing"]);
        assert_eq!(
            resolved.binding("feature"),
            Some(Binding::Value("serde tracing".into()))
        );
    }

    #[test]
    fn test_param_value_may_look_like_an_option() {
        let resolved = bind(&label(), &args(&["--target", "--release"])).unwrap();
        assert_eq!(resolved.params[0].values, vec!["--release"]);
        assert!(!resolved.flags[0].present);
    }

    #[test]
    fn test_unknown_argument() {
        let err = bind(&label(), &args(&["--nope"])).unwrap_err();
        assert_eq!(
            err,
            BindError::UnknownArgument {
                argument: "--nope".into(),
                label: "build".into()
            }
        );
    }

    #[test]
    fn test_positional_argument_is_rejected() {
        let err = bind(&label(), &args(&["release"])).unwrap_err();
        assert!(matches!(err, BindError::UnknownArgument { .. }));
    }

    #[test]
    fn test_param_without_value() {
        let err = bind(&label(), &args(&["--release", "-t"])).unwrap_err();
        assert_eq!(
            err,
            BindError::MissingValue {
                param: "target".into(),
                label: "build".into()
            }
        );
    }

    #[test]
    fn test_binding_leaves_original_untouched() {
        let original = label();
        let first = bind(&original, &args(&["--release"])).unwrap();
        let second = bind(&original, &args(&["--target", "x"])).unwrap();

        assert_eq!(original, label());
        assert!(first.flags[0].present);
        assert!(!first.params[0].bound);
        assert!(!second.flags[0].present);
        assert_eq!(second.params[0].values, vec!["x"]);
    }
}
