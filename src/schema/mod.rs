//! Schema Validator
//!
//! Validates converted task configs and whole manifests against the JSON
//! Schemas shipped in `schemas/`.
//!
//! ## Design
//!
//! - Schemas are embedded with `include_str!` and compiled once per validator
//! - `SchemaValidator::new()` gives an explicit instance; `shared()` a lazily
//!   initialized process-wide one
//! - Only the first violation is surfaced, with its JSON pointer path
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taskgraph::schema::SchemaValidator;
//!
//! let validator = SchemaValidator::shared()?;
//! validator.validate_task_config(TaskKind::Wait, &json!({"duration": "5m"}))?;
//! ```

use std::fmt;
use std::sync::OnceLock;

use jsonschema::Validator;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::debug;

use crate::error::{Result, TaskGraphError};
use crate::task::TaskKind;

/// Embedded schema JSON (compiled at build time)
const MANIFEST_SCHEMA: &str = include_str!("../../schemas/workflow-manifest.schema.json");

fn task_schema(kind: TaskKind) -> &'static str {
    match kind {
        TaskKind::Set => include_str!("../../schemas/tasks/set.schema.json"),
        TaskKind::HttpCall => include_str!("../../schemas/tasks/http_call.schema.json"),
        TaskKind::GrpcCall => include_str!("../../schemas/tasks/grpc_call.schema.json"),
        TaskKind::Switch => include_str!("../../schemas/tasks/switch.schema.json"),
        TaskKind::For => include_str!("../../schemas/tasks/for.schema.json"),
        TaskKind::Fork => include_str!("../../schemas/tasks/fork.schema.json"),
        TaskKind::Try => include_str!("../../schemas/tasks/try.schema.json"),
        TaskKind::Listen => include_str!("../../schemas/tasks/listen.schema.json"),
        TaskKind::Wait => include_str!("../../schemas/tasks/wait.schema.json"),
        TaskKind::CallActivity => include_str!("../../schemas/tasks/call_activity.schema.json"),
        TaskKind::Raise => include_str!("../../schemas/tasks/raise.schema.json"),
        TaskKind::Run => include_str!("../../schemas/tasks/run.schema.json"),
        TaskKind::AgentCall => include_str!("../../schemas/tasks/agent_call.schema.json"),
    }
}

/// Global schema validator instance (lazy initialization)
static SHARED: OnceLock<std::result::Result<SchemaValidator, String>> = OnceLock::new();

/// Compiled per-kind and manifest schemas
pub struct SchemaValidator {
    manifest: Validator,
    tasks: FxHashMap<TaskKind, Validator>,
}

impl fmt::Debug for SchemaValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("task_schemas", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl SchemaValidator {
    /// Compile every embedded schema
    pub fn new() -> Result<Self> {
        Self::compile().map_err(|reason| TaskGraphError::SchemaInit { reason })
    }

    /// Process-wide instance, compiled on first use
    pub fn shared() -> Result<&'static SchemaValidator> {
        match SHARED.get_or_init(Self::compile) {
            Ok(validator) => Ok(validator),
            Err(reason) => Err(TaskGraphError::SchemaInit {
                reason: reason.clone(),
            }),
        }
    }

    fn compile() -> std::result::Result<Self, String> {
        let manifest = compile_one("workflow-manifest", MANIFEST_SCHEMA)?;
        let mut tasks = FxHashMap::default();
        for kind in TaskKind::ALL {
            tasks.insert(kind, compile_one(kind.as_str(), task_schema(kind))?);
        }
        debug!(task_schemas = tasks.len(), "compiled JSON schemas");
        Ok(Self { manifest, tasks })
    }

    /// Validate a converted `task_config` against its kind's schema
    pub fn validate_task_config(
        &self,
        kind: TaskKind,
        config: &Value,
    ) -> std::result::Result<(), SchemaError> {
        match self.tasks.get(&kind) {
            Some(validator) => first_error(validator, config),
            None => Err(SchemaError {
                path: String::new(),
                message: format!("no schema registered for task kind {}", kind),
                kind: SchemaErrorKind::Other,
            }),
        }
    }

    /// Validate a whole manifest (camelCase wire form)
    pub fn validate_manifest(&self, manifest: &Value) -> std::result::Result<(), SchemaError> {
        first_error(&self.manifest, manifest)
    }
}

fn compile_one(name: &str, source: &str) -> std::result::Result<Validator, String> {
    let schema: Value = serde_json::from_str(source)
        .map_err(|e| format!("Failed to parse {} schema JSON: {}", name, e))?;
    Validator::new(&schema).map_err(|e| format!("Failed to compile {} schema: {}", name, e))
}

fn first_error(validator: &Validator, value: &Value) -> std::result::Result<(), SchemaError> {
    match validator.iter_errors(value).next() {
        None => Ok(()),
        Some(e) => Err(SchemaError {
            path: e.instance_path.to_string(),
            message: e.to_string(),
            kind: classify_error(&e),
        }),
    }
}

/// Schema validation error details
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// JSON pointer path to the error (e.g., "/endpoint/uri")
    pub path: String,
    /// Human-readable error message
    pub message: String,
    /// Error classification
    pub kind: SchemaErrorKind,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            f.write_str(&self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Schema error classification
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaErrorKind {
    /// Missing required field
    MissingRequired { field: String },
    /// Unknown field (not in schema)
    UnknownField { field: String },
    /// Type mismatch
    TypeMismatch { expected: String, actual: String },
    /// Invalid enum or const value
    InvalidEnum { value: String, allowed: Vec<String> },
    /// Numeric bound, length or item count violated
    OutOfRange,
    /// Pattern or format mismatch
    InvalidFormat,
    /// Generic validation error
    Other,
}

const RANGE_KINDS: &[&str] = &[
    "Minimum",
    "Maximum",
    "ExclusiveMinimum",
    "ExclusiveMaximum",
    "MinLength",
    "MaxLength",
    "MinItems",
    "MaxItems",
    "MinProperties",
    "MaxProperties",
];

/// Classify a JSON Schema error into a SchemaErrorKind
fn classify_error(error: &jsonschema::ValidationError) -> SchemaErrorKind {
    let error_str = format!("{:?}", error.kind);
    let message = error.to_string();

    if error_str.starts_with("Required") {
        let field = extract_quoted(&message).unwrap_or_else(|| "unknown".to_string());
        SchemaErrorKind::MissingRequired { field }
    } else if error_str.starts_with("AdditionalProperties") {
        let field = extract_quoted(&message).unwrap_or_else(|| {
            let path = error.instance_path.to_string();
            path.rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or("unknown")
                .to_string()
        });
        SchemaErrorKind::UnknownField { field }
    } else if error_str.starts_with("Type") {
        SchemaErrorKind::TypeMismatch {
            expected: extract_type(&message).unwrap_or_else(|| "expected".to_string()),
            actual: json_type(&error.instance).to_string(),
        }
    } else if error_str.starts_with("Enum") || error_str.starts_with("Constant") {
        SchemaErrorKind::InvalidEnum {
            value: error.instance.to_string(),
            allowed: extract_allowed(&message),
        }
    } else if RANGE_KINDS.iter().any(|k| error_str.starts_with(k)) {
        SchemaErrorKind::OutOfRange
    } else if error_str.starts_with("Pattern") || error_str.starts_with("Format") {
        SchemaErrorKind::InvalidFormat
    } else {
        SchemaErrorKind::Other
    }
}

/// Extract quoted string from error message
fn extract_quoted(msg: &str) -> Option<String> {
    for quote in ['"', '\''] {
        if let Some(start) = msg.find(quote) {
            if let Some(end) = msg[start + 1..].find(quote) {
                return Some(msg[start + 1..start + 1 + end].to_string());
            }
        }
    }
    None
}

/// Extract type name from error message
fn extract_type(msg: &str) -> Option<String> {
    let tail = msg.rsplit("of type").next().unwrap_or(msg);
    ["string", "integer", "number", "boolean", "array", "object", "null"]
        .into_iter()
        .find(|t| tail.contains(t))
        .map(str::to_string)
}

/// `... is not one of ["a","b"]` -> `["a", "b"]`
fn extract_allowed(msg: &str) -> Vec<String> {
    msg.find('[')
        .and_then(|start| serde_json::from_str::<Vec<Value>>(&msg[start..]).ok())
        .map(|values| {
            values
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// TESTS
// ============================================================================
