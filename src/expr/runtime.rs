//! Runtime-only placeholders
//!
//! Secrets and environment values are never known at build time. They are
//! written into the manifest as `${.secrets.KEY}` / `${.env_vars.NAME}` and
//! substituted by the engine just before a task runs.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use super::grammar::Term;
use super::value::{Deferred, Expr, IntoExpr};
use crate::error::{ErrorKind, Rule, ValidationError};

/// Exact runtime placeholder
static RUNTIME_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\$\{\.(?:secrets|env_vars)\.[A-Z_][A-Z0-9_]*\}$").unwrap());

/// Runtime placeholders embedded in a longer string
static RUNTIME_REF_SCAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\.(?:secrets|env_vars)\.[A-Z_][A-Z0-9_]*\}").unwrap());

/// Anything that looks like it wants to be a runtime placeholder
static RUNTIME_REF_LOOSE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{\s*\.(?:secrets|env_vars)\.[^}]*\}").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeScope {
    Secret,
    Env,
}

impl RuntimeScope {
    fn segment(&self) -> &'static str {
        match self {
            RuntimeScope::Secret => "secrets",
            RuntimeScope::Env => "env_vars",
        }
    }
}

/// Reference to a value supplied only at execution time
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RuntimeRef {
    scope: RuntimeScope,
    name: String,
}

impl RuntimeRef {
    pub fn scope(&self) -> RuntimeScope {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn placeholder(&self) -> String {
        format!("${{.{}.{}}}", self.scope.segment(), self.name)
    }

    pub fn is_secret(&self) -> bool {
        self.scope == RuntimeScope::Secret
    }
}

impl fmt::Display for RuntimeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.placeholder())
    }
}

impl IntoExpr for RuntimeRef {
    fn into_expr(self) -> Expr {
        Expr::Deferred(Deferred::new(self.placeholder()))
    }
}

impl IntoExpr for &RuntimeRef {
    fn into_expr(self) -> Expr {
        Expr::Deferred(Deferred::new(self.placeholder()))
    }
}

impl From<RuntimeRef> for Term {
    fn from(r: RuntimeRef) -> Self {
        Term::Embedded(Deferred::new(r.placeholder()))
    }
}

/// `${.secrets.<key>}`
pub fn runtime_secret(key: &str) -> RuntimeRef {
    RuntimeRef {
        scope: RuntimeScope::Secret,
        name: key.to_string(),
    }
}

/// `${.env_vars.<name>}`
pub fn runtime_env(name: &str) -> RuntimeRef {
    RuntimeRef {
        scope: RuntimeScope::Env,
        name: name.to_string(),
    }
}

pub fn is_runtime_ref(s: &str) -> bool {
    RUNTIME_REF_RE.is_match(s)
}

/// Check that `s` is exactly one well-formed runtime placeholder
pub fn validate_runtime_ref(s: &str) -> Result<(), ValidationError> {
    if is_runtime_ref(s) {
        return Ok(());
    }
    Err(ValidationError::new(
        ErrorKind::InvalidRuntimeReference,
        "",
        Rule::Format,
        format!(
            "invalid runtime reference '{}': expected ${{.secrets.KEY}} or ${{.env_vars.NAME}} \
             with an UPPER_SNAKE_CASE name",
            s
        ),
    )
    .with_value(s))
}

/// All well-formed runtime placeholders inside `s`, in order
pub fn extract_runtime_refs(s: &str) -> Vec<String> {
    RUNTIME_REF_SCAN_RE
        .find_iter(s)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Placeholders in `s` that target secrets/env_vars but are malformed
pub(crate) fn malformed_runtime_refs(s: &str) -> Vec<String> {
    RUNTIME_REF_LOOSE_RE
        .find_iter(s)
        .map(|m| m.as_str())
        .filter(|m| !is_runtime_ref(m))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_shapes() {
        assert_eq!(runtime_secret("API_KEY").placeholder(), "${.secrets.API_KEY}");
        assert_eq!(runtime_env("REGION").to_string(), "${.env_vars.REGION}");
        assert!(runtime_secret("X").is_secret());
        assert!(!runtime_env("X").is_secret());
    }

    #[test]
    fn test_runtime_refs_are_deferred() {
        let expr = runtime_secret("TOKEN").into_expr();
        assert!(expr.is_deferred());
        assert_eq!(expr.render(), "${.secrets.TOKEN}");
    }

    #[test]
    fn test_validate_runtime_ref() {
        assert!(validate_runtime_ref("${.secrets.API_KEY}").is_ok());
        assert!(validate_runtime_ref("${.env_vars._PRIVATE2}").is_ok());

        for bad in [
            "${.secrets.api_key}",
            "${.secret.API_KEY}",
            "${ .secrets.API_KEY }",
            "${.secrets.1KEY}",
            "prefix ${.secrets.KEY}",
        ] {
            let err = validate_runtime_ref(bad).unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidRuntimeReference);
            assert_eq!(err.rule, Rule::Format);
        }
    }

    #[test]
    fn test_extract_runtime_refs() {
        let text = "Bearer ${.secrets.TOKEN} in ${.env_vars.REGION} and ${.secrets.bad}";
        assert_eq!(
            extract_runtime_refs(text),
            vec!["${.secrets.TOKEN}".to_string(), "${.env_vars.REGION}".to_string()]
        );
        assert!(extract_runtime_refs("no refs").is_empty());
    }

    #[test]
    fn test_malformed_detection() {
        assert_eq!(
            malformed_runtime_refs("x ${.secrets.bad} ${.secrets.GOOD}"),
            vec!["${.secrets.bad}".to_string()]
        );
        assert!(malformed_runtime_refs("${ $context.a }").is_empty());
    }
}
