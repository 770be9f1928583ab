//! `$$NAME` reference substitution

use super::Environ;
use crate::ast::Variables;
use crate::binder::{Binding, ResolvedLabel};
use regex::Regex;
use std::sync::LazyLock;

// `$$$$` is a literal `$$`; `$${name}` allows hyphenated option names.
#[allow(clippy::expect_used)]
static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"\$\$(?:\$\$|\{(?P<braced>[A-Za-z_][A-Za-z0-9_-]*)\}|(?P<bare>[A-Za-z_][A-Za-z0-9_]*))",
    )
    .expect("reference pattern must compile")
});

/// Everything a command line can refer to, in lookup order.
pub(super) struct Scope<'a> {
    pub(super) label: &'a ResolvedLabel,
    pub(super) variables: &'a Variables,
    pub(super) environ: &'a Environ,
}

impl Scope<'_> {
    fn resolve(&self, name: &str) -> Option<String> {
        match self.label.binding(name) {
            Some(Binding::Value(value)) => return Some(value),
            Some(Binding::Unbound) => return None,
            None => {}
        }
        if let Some((_, value)) = self.variables.iter().find(|(key, _)| key == name) {
            return Some(value.render());
        }
        self.environ.get(name).cloned()
    }
}

/// Replace every reference in `line`; on failure returns the unresolved name.
pub(super) fn substitute(line: &str, scope: &Scope<'_>) -> Result<String, String> {
    let mut out = String::with_capacity(line.len());
    let mut last = 0;
    for caps in REFERENCE.captures_iter(line) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&line[last..whole.start()]);
        match caps.name("braced").or_else(|| caps.name("bare")) {
            Some(name) => {
                let value = scope
                    .resolve(name.as_str())
                    .ok_or_else(|| name.as_str().to_string())?;
                out.push_str(&value);
            }
            None => out.push_str("$$"),
        }
        last = whole.end();
    }
    out.push_str(&line[last..]);
    Ok(out)
}
