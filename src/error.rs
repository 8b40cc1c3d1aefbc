//! Error types with error codes and fix suggestions
//!
//! Error code ranges:
//! - TG-000-009: Structural validation errors
//! - TG-010-019: Conversion errors
//! - TG-020-029: Schema errors
//! - TG-030-039: Serialization errors
//!
//! Every failure carries an [`ErrorKind`] sentinel so callers can match on
//! the category without parsing messages. [`TaskGraphError::is`] walks the
//! cause chain, so a kind wrapped inside a conversion error still matches.

use std::fmt;

use miette::Diagnostic;
use thiserror::Error;

use crate::schema::{SchemaError, SchemaErrorKind};
use crate::task::TaskKind;

pub type Result<T> = std::result::Result<T, TaskGraphError>;

/// Offending values longer than this are truncated in error reports
const MAX_VALUE_LEN: usize = 100;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

// ─────────────────────────────────────────────────────────────
// Sentinels
// ─────────────────────────────────────────────────────────────

/// Error category sentinels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidNamespace,
    InvalidName,
    InvalidVersion,
    InvalidSlug,
    NoTasks,
    DuplicateTaskName,
    InvalidTaskName,
    InvalidTaskKind,
    InvalidTaskConfig,
    MissingRequiredField,
    UnknownTaskReference,
    DependencyCycle,
    InvalidEnvironmentVariable,
    InvalidRuntimeReference,
    Interpolation,
    Conversion,
    Serialization,
    SchemaUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidNamespace => "invalid namespace",
            ErrorKind::InvalidName => "invalid name",
            ErrorKind::InvalidVersion => "invalid version",
            ErrorKind::InvalidSlug => "invalid slug",
            ErrorKind::NoTasks => "workflow has no tasks",
            ErrorKind::DuplicateTaskName => "duplicate task name",
            ErrorKind::InvalidTaskName => "invalid task name",
            ErrorKind::InvalidTaskKind => "invalid task kind",
            ErrorKind::InvalidTaskConfig => "invalid task config",
            ErrorKind::MissingRequiredField => "missing required field",
            ErrorKind::UnknownTaskReference => "unknown task reference",
            ErrorKind::DependencyCycle => "dependency cycle",
            ErrorKind::InvalidEnvironmentVariable => "invalid environment variable",
            ErrorKind::InvalidRuntimeReference => "invalid runtime reference",
            ErrorKind::Interpolation => "interpolation failed",
            ErrorKind::Conversion => "conversion failed",
            ErrorKind::Serialization => "serialization failed",
            ErrorKind::SchemaUnavailable => "schema unavailable",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation rule that was violated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Rule {
    Required,
    MaxLength,
    Format,
    Unique,
    Exists,
    Acyclic,
}

impl Rule {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rule::Required => "required",
            Rule::MaxLength => "max_length",
            Rule::Format => "format",
            Rule::Unique => "unique",
            Rule::Exists => "exists",
            Rule::Acyclic => "acyclic",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────
// Validation / conversion payloads
// ─────────────────────────────────────────────────────────────

/// A single rule violation, located by field path (e.g. `tasks[1].name`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub value: String,
    pub rule: Rule,
    pub message: String,
    pub kind: ErrorKind,
}

impl ValidationError {
    pub fn new(
        kind: ErrorKind,
        field: impl Into<String>,
        rule: Rule,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            value: String::new(),
            rule,
            message: message.into(),
            kind,
        }
    }

    /// Attach the offending value (truncated for display)
    pub fn with_value(mut self, value: impl fmt::Display) -> Self {
        self.value = truncate_value(&value.to_string());
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "validation failed: {}", self.message)
        } else {
            write!(
                f,
                "validation failed for field \"{}\": {}",
                self.field, self.message
            )
        }
    }
}

impl std::error::Error for ValidationError {}

/// Failure while turning a graph element into its wire form
#[derive(Debug)]
pub struct ConversionError {
    pub type_name: String,
    pub field: String,
    pub message: String,
    pub cause: Option<Box<TaskGraphError>>,
}

impl ConversionError {
    pub fn new(
        type_name: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_name: type_name.into(),
            field: field.into(),
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(mut self, cause: TaskGraphError) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "failed to convert {}: {}", self.type_name, self.message)
        } else {
            write!(
                f,
                "failed to convert {}.{}: {}",
                self.type_name, self.field, self.message
            )
        }
    }
}

impl std::error::Error for ConversionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ─────────────────────────────────────────────────────────────
// Top-level error
// ─────────────────────────────────────────────────────────────

/// All errors surfaced by the crate.
///
/// Implements both `thiserror::Error` for std error compatibility
/// and `miette::Diagnostic` for fancy terminal error display.
#[derive(Error, Debug, Diagnostic)]
pub enum TaskGraphError {
    // ═══════════════════════════════════════════
    // VALIDATION ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[TG-001] {0}")]
    #[diagnostic(
        code(taskgraph::validation),
        help("Fix the reported field; only the first violation is reported")
    )]
    Validation(#[from] ValidationError),

    // ═══════════════════════════════════════════
    // CONVERSION ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[TG-010] {0}")]
    #[diagnostic(
        code(taskgraph::conversion),
        help("Inspect the underlying cause for the failing task")
    )]
    Conversion(#[from] ConversionError),

    // ═══════════════════════════════════════════
    // SCHEMA ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[TG-020] Task '{task}' ({kind}) violates its schema at '{}': {}", .error.path, .error.message)]
    #[diagnostic(
        code(taskgraph::task_schema),
        help("Check the task builder calls against the kind's required fields")
    )]
    TaskSchema {
        task: String,
        kind: TaskKind,
        error: SchemaError,
    },

    #[error("[TG-021] Manifest violates the workflow schema at '{}': {}", .error.path, .error.message)]
    #[diagnostic(code(taskgraph::manifest_schema))]
    ManifestSchema { error: SchemaError },

    #[error("[TG-022] Schema initialization failed: {reason}")]
    #[diagnostic(code(taskgraph::schema_init))]
    SchemaInit { reason: String },

    // ═══════════════════════════════════════════
    // SERIALIZATION ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[TG-030] Serialization failed: {details}")]
    #[diagnostic(code(taskgraph::serialization))]
    Serialization { details: String },
}

impl TaskGraphError {
    /// Outermost error category
    pub fn kind(&self) -> ErrorKind {
        match self {
            TaskGraphError::Validation(e) => e.kind,
            TaskGraphError::Conversion(_) => ErrorKind::Conversion,
            TaskGraphError::TaskSchema { error, .. } | TaskGraphError::ManifestSchema { error } => {
                match error.kind {
                    SchemaErrorKind::MissingRequired { .. } => ErrorKind::MissingRequiredField,
                    _ => ErrorKind::InvalidTaskConfig,
                }
            }
            TaskGraphError::SchemaInit { .. } => ErrorKind::SchemaUnavailable,
            TaskGraphError::Serialization { .. } => ErrorKind::Serialization,
        }
    }

    /// True when this error, or any error in its cause chain, has `kind`
    pub fn is(&self, kind: ErrorKind) -> bool {
        if self.kind() == kind {
            return true;
        }
        match self {
            TaskGraphError::Conversion(c) => c.cause.as_ref().is_some_and(|e| e.is(kind)),
            _ => false,
        }
    }

    /// First validation payload in the cause chain
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            TaskGraphError::Validation(e) => Some(e),
            TaskGraphError::Conversion(c) => c.cause.as_ref().and_then(|e| e.validation()),
            _ => None,
        }
    }

    /// Innermost schema violation in the cause chain
    pub fn schema_error(&self) -> Option<&SchemaError> {
        match self {
            TaskGraphError::TaskSchema { error, .. } | TaskGraphError::ManifestSchema { error } => {
                Some(error)
            }
            TaskGraphError::Conversion(c) => c.cause.as_ref().and_then(|e| e.schema_error()),
            _ => None,
        }
    }

    pub(crate) fn serialization(details: impl fmt::Display) -> Self {
        TaskGraphError::Serialization {
            details: details.to_string(),
        }
    }
}

impl FixSuggestion for TaskGraphError {
    fn fix_suggestion(&self) -> Option<&str> {
        let hint = match self.kind() {
            ErrorKind::InvalidNamespace => "Set a non-empty namespace on the workflow builder",
            ErrorKind::InvalidName => "Set a non-empty workflow name",
            ErrorKind::InvalidVersion => "Use a semantic version such as 1.0.0 or 2.1.0-beta.1",
            ErrorKind::InvalidSlug => "Slugs are lowercase letters, digits and inner hyphens",
            ErrorKind::NoTasks => "Add at least one task before converting",
            ErrorKind::DuplicateTaskName => "Give every task a unique name",
            ErrorKind::InvalidTaskName => {
                "Task names use letters, digits, '-' and '_' (max 100 chars)"
            }
            ErrorKind::InvalidTaskKind => "Use one of the supported task kinds (SET, HTTP_CALL, ...)",
            ErrorKind::InvalidTaskConfig | ErrorKind::MissingRequiredField => {
                "Check the task's required fields and value ranges"
            }
            ErrorKind::UnknownTaskReference => "Add the referenced task or fix the target name",
            ErrorKind::DependencyCycle => "Remove one of the depends_on edges forming the cycle",
            ErrorKind::InvalidEnvironmentVariable => {
                "Environment variable names are UPPER_SNAKE_CASE and unique"
            }
            ErrorKind::InvalidRuntimeReference => {
                "Use runtime_secret(\"KEY\") or runtime_env(\"VAR\") with UPPER_SNAKE_CASE names"
            }
            ErrorKind::Interpolation => "Declare the variable on the Context before converting",
            ErrorKind::Conversion => return None,
            ErrorKind::Serialization => "Report this: the manifest could not be encoded",
            ErrorKind::SchemaUnavailable => "Report this: the embedded schemas failed to compile",
        };
        Some(hint)
    }
}

/// Truncate long values for error display (char-boundary safe)
fn truncate_value(value: &str) -> String {
    if value.chars().count() <= MAX_VALUE_LEN {
        return value.to_string();
    }
    let mut out: String = value.chars().take(MAX_VALUE_LEN).collect();
    out.push_str("...");
    out
}
