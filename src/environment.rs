//! Declared external inputs
//!
//! An [`EnvironmentVariable`] tells the engine which values a workflow expects
//! from its execution environment. Declarations are copied into the manifest's
//! `envSpec`; the values themselves are read through runtime placeholders.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::{ErrorKind, Result, Rule, ValidationError};
use crate::expr::{runtime_env, runtime_secret, Expr, IntoExpr, RuntimeRef};

static ENV_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z_][A-Z0-9_]*$").unwrap());

/// A named input the workflow expects at execution time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentVariable {
    name: String,
    is_secret: bool,
    description: Option<String>,
    default_value: Option<String>,
    required: bool,
}

impl EnvironmentVariable {
    pub fn builder(name: impl Into<String>) -> EnvironmentVariableBuilder {
        EnvironmentVariableBuilder {
            name: name.into(),
            is_secret: false,
            description: None,
            default_value: None,
            required: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_secret(&self) -> bool {
        self.is_secret
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Runtime reference resolving to this input's value
    pub fn runtime_ref(&self) -> RuntimeRef {
        if self.is_secret {
            runtime_secret(&self.name)
        } else {
            runtime_env(&self.name)
        }
    }

    /// `${.secrets.NAME}` for secrets, `${.env_vars.NAME}` otherwise
    pub fn placeholder(&self) -> String {
        self.runtime_ref().placeholder()
    }
}

impl fmt::Display for EnvironmentVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EnvVar({}", self.name)?;
        if self.is_secret {
            f.write_str(" (secret)")?;
        }
        if !self.required {
            f.write_str(" (optional)")?;
        }
        f.write_str(")")
    }
}

impl IntoExpr for &EnvironmentVariable {
    fn into_expr(self) -> Expr {
        self.runtime_ref().into_expr()
    }
}

/// Builder for [`EnvironmentVariable`]
#[derive(Debug, Clone)]
pub struct EnvironmentVariableBuilder {
    name: String,
    is_secret: bool,
    description: Option<String>,
    default_value: Option<String>,
    required: Option<bool>,
}

impl EnvironmentVariableBuilder {
    pub fn secret(mut self) -> Self {
        self.is_secret = true;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Setting a default makes the variable optional unless `required` says otherwise
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn build(self) -> Result<EnvironmentVariable> {
        if !ENV_NAME_RE.is_match(&self.name) {
            return Err(ValidationError::new(
                ErrorKind::InvalidEnvironmentVariable,
                "name",
                Rule::Format,
                "environment variable name must be UPPER_SNAKE_CASE (^[A-Z_][A-Z0-9_]*$)",
            )
            .with_value(&self.name)
            .into());
        }

        if self.is_secret && self.default_value.is_some() {
            warn!(
                name = %self.name,
                "secret environment variable has a default value; it will be written to the manifest"
            );
        }

        let required = self
            .required
            .unwrap_or(self.default_value.is_none());

        Ok(EnvironmentVariable {
            name: self.name,
            is_secret: self.is_secret,
            description: self.description,
            default_value: self.default_value,
            required,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let var = EnvironmentVariable::builder("REGION").build().unwrap();
        assert!(var.is_required());
        assert!(!var.is_secret());
        assert_eq!(var.placeholder(), "${.env_vars.REGION}");
        assert_eq!(var.to_string(), "EnvVar(REGION)");
    }

    #[test]
    fn test_secret_placeholder() {
        let var = EnvironmentVariable::builder("API_KEY")
            .secret()
            .description("upstream token")
            .build()
            .unwrap();
        assert_eq!(var.placeholder(), "${.secrets.API_KEY}");
        let expr = (&var).into_expr();
        assert!(expr.is_deferred());
        assert_eq!(expr.render(), "${.secrets.API_KEY}");
        assert_eq!(var.description(), Some("upstream token"));
    }

    #[test]
    fn test_default_makes_optional() {
        let var = EnvironmentVariable::builder("LOG_LEVEL")
            .default_value("info")
            .build()
            .unwrap();
        assert!(!var.is_required());
        assert_eq!(var.default_value(), Some("info"));
        assert_eq!(var.to_string(), "EnvVar(LOG_LEVEL (optional))");

        let forced = EnvironmentVariable::builder("LOG_LEVEL")
            .default_value("info")
            .required(true)
            .build()
            .unwrap();
        assert!(forced.is_required());
    }

    #[test]
    fn test_display_secret_optional() {
        let var = EnvironmentVariable::builder("TOKEN")
            .secret()
            .default_value("dev-token")
            .build()
            .unwrap();
        assert_eq!(var.to_string(), "EnvVar(TOKEN (secret) (optional))");
    }

    #[test]
    fn test_invalid_names_rejected() {
        for bad in ["", "lower", "1START", "HAS-DASH", "HAS SPACE"] {
            let err = EnvironmentVariable::builder(bad).build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidEnvironmentVariable, "{bad:?}");
            assert_eq!(err.validation().map(|v| v.rule), Some(Rule::Format));
        }
    }
}
