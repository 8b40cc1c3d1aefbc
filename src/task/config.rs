//! Kind-specific task configuration payloads
//!
//! One struct per [`TaskKind`], gathered in the [`TaskConfig`] sum type.
//! Values are stored as unresolved [`Expr`]s; the converter renders them.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{Task, TaskKind};
use crate::error::{ErrorKind, Rule, ValidationError};
use crate::expr::Expr;

/// Ordered key → expression map (deterministic wire output)
pub type ExprMap = BTreeMap<String, Expr>;

// ============================================================================
// SHARED LEAF TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(ValidationError::new(
                ErrorKind::InvalidTaskConfig,
                "method",
                Rule::Format,
                format!("unsupported HTTP method '{}'", s),
            )
            .with_value(s)),
        }
    }
}

/// Visibility scope of an agent or skill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceScope {
    Platform,
    Organization,
}

impl ResourceScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceScope::Platform => "platform",
            ResourceScope::Organization => "organization",
        }
    }
}

/// Opaque slug/scope pair pointing at an agent or skill.
///
/// Copied into task configs verbatim; nothing here interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<ResourceScope>,
}

impl ResourceRef {
    pub fn new(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            scope: None,
        }
    }

    pub fn platform(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            scope: Some(ResourceScope::Platform),
        }
    }

    pub fn organization(slug: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            scope: Some(ResourceScope::Organization),
        }
    }
}

impl From<&str> for ResourceRef {
    fn from(slug: &str) -> Self {
        ResourceRef::new(slug)
    }
}

impl From<String> for ResourceRef {
    fn from(slug: String) -> Self {
        ResourceRef::new(slug)
    }
}

pub type AgentRef = ResourceRef;
pub type SkillRef = ResourceRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurationUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DurationUnit {
    fn suffix(&self) -> char {
        match self {
            DurationUnit::Seconds => 's',
            DurationUnit::Minutes => 'm',
            DurationUnit::Hours => 'h',
            DurationUnit::Days => 'd',
        }
    }
}

/// Wait duration in the engine's `<n><unit>` form (`30s`, `5m`, `2h`, `1d`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Duration {
    value: u64,
    unit: DurationUnit,
}

impl Duration {
    pub fn seconds(value: u64) -> Self {
        Self {
            value,
            unit: DurationUnit::Seconds,
        }
    }

    pub fn minutes(value: u64) -> Self {
        Self {
            value,
            unit: DurationUnit::Minutes,
        }
    }

    pub fn hours(value: u64) -> Self {
        Self {
            value,
            unit: DurationUnit::Hours,
        }
    }

    pub fn days(value: u64) -> Self {
        Self {
            value,
            unit: DurationUnit::Days,
        }
    }

    pub fn value(&self) -> u64 {
        self.value
    }

    pub fn unit(&self) -> DurationUnit {
        self.unit
    }

    /// Total length in seconds (saturating)
    pub fn as_secs(&self) -> u64 {
        let factor = match self.unit {
            DurationUnit::Seconds => 1,
            DurationUnit::Minutes => 60,
            DurationUnit::Hours => 3_600,
            DurationUnit::Days => 86_400,
        };
        self.value.saturating_mul(factor)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit.suffix())
    }
}

impl FromStr for Duration {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            ValidationError::new(
                ErrorKind::InvalidTaskConfig,
                "duration",
                Rule::Format,
                format!("invalid duration '{}': expected <number><s|m|h|d>", s),
            )
            .with_value(s)
        };

        let s = s.trim();
        let unit = match s.chars().last() {
            Some('s') => DurationUnit::Seconds,
            Some('m') => DurationUnit::Minutes,
            Some('h') => DurationUnit::Hours,
            Some('d') => DurationUnit::Days,
            _ => return Err(invalid()),
        };
        let digits = &s[..s.len() - 1];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let value = digits.parse::<u64>().map_err(|_| invalid())?;
        Ok(Self { value, unit })
    }
}

// ============================================================================
// PER-KIND PAYLOADS
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetConfig {
    pub variables: ExprMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpCallConfig {
    pub method: HttpMethod,
    pub uri: Expr,
    pub headers: ExprMap,
    /// Whole-body value; takes precedence over `body_fields`
    pub body: Option<Expr>,
    pub body_fields: ExprMap,
    /// 0 = engine default
    pub timeout_seconds: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GrpcCallConfig {
    pub service: String,
    pub method: String,
    pub body: ExprMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SwitchCase {
    pub condition: Expr,
    pub then: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SwitchConfig {
    pub cases: Vec<SwitchCase>,
    pub default_task: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForConfig {
    /// Loop variable name
    pub each: String,
    pub over: Option<Expr>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForkBranch {
    pub name: String,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ForkConfig {
    pub branches: Vec<ForkBranch>,
    /// First branch to finish wins
    pub compete: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatchBlock {
    /// Variable the caught error is bound to
    pub as_var: String,
    /// Error types to catch; empty catches everything
    pub errors: Vec<String>,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TryConfig {
    pub tasks: Vec<Task>,
    pub catch: Option<CatchBlock>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListenConfig {
    pub event: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaitConfig {
    pub duration: Duration,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallActivityConfig {
    pub activity: String,
    pub input: ExprMap,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RaiseConfig {
    pub error: String,
    pub message: Option<Expr>,
    pub data: ExprMap,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunConfig {
    pub workflow: String,
    pub input: ExprMap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentCallConfig {
    pub agent: AgentRef,
    pub message: Expr,
    pub env: ExprMap,
    pub skills: Vec<SkillRef>,
    pub model: Option<String>,
    /// 0 = engine default
    pub timeout_seconds: u32,
    pub temperature: Option<f64>,
}

// ============================================================================
// SUM TYPE
// ============================================================================

/// Task payload; the variant determines the task kind
#[derive(Debug, Clone, PartialEq)]
pub enum TaskConfig {
    Set(SetConfig),
    HttpCall(HttpCallConfig),
    GrpcCall(GrpcCallConfig),
    Switch(SwitchConfig),
    For(ForConfig),
    Fork(ForkConfig),
    Try(TryConfig),
    Listen(ListenConfig),
    Wait(WaitConfig),
    CallActivity(CallActivityConfig),
    Raise(RaiseConfig),
    Run(RunConfig),
    AgentCall(AgentCallConfig),
}

impl TaskConfig {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskConfig::Set(_) => TaskKind::Set,
            TaskConfig::HttpCall(_) => TaskKind::HttpCall,
            TaskConfig::GrpcCall(_) => TaskKind::GrpcCall,
            TaskConfig::Switch(_) => TaskKind::Switch,
            TaskConfig::For(_) => TaskKind::For,
            TaskConfig::Fork(_) => TaskKind::Fork,
            TaskConfig::Try(_) => TaskKind::Try,
            TaskConfig::Listen(_) => TaskKind::Listen,
            TaskConfig::Wait(_) => TaskKind::Wait,
            TaskConfig::CallActivity(_) => TaskKind::CallActivity,
            TaskConfig::Raise(_) => TaskKind::Raise,
            TaskConfig::Run(_) => TaskKind::Run,
            TaskConfig::AgentCall(_) => TaskKind::AgentCall,
        }
    }

    /// Nested task lists (loop body, branches, try and catch blocks)
    pub fn nested(&self) -> Vec<&[Task]> {
        match self {
            TaskConfig::For(c) => vec![c.tasks.as_slice()],
            TaskConfig::Fork(c) => c.branches.iter().map(|b| b.tasks.as_slice()).collect(),
            TaskConfig::Try(c) => {
                let mut lists = vec![c.tasks.as_slice()];
                if let Some(catch) = &c.catch {
                    lists.push(catch.tasks.as_slice());
                }
                lists
            }
            _ => Vec::new(),
        }
    }

    pub(crate) fn nested_mut(&mut self) -> Vec<&mut Vec<Task>> {
        match self {
            TaskConfig::For(c) => vec![&mut c.tasks],
            TaskConfig::Fork(c) => c.branches.iter_mut().map(|b| &mut b.tasks).collect(),
            TaskConfig::Try(c) => {
                let mut lists = vec![&mut c.tasks];
                if let Some(catch) = &mut c.catch {
                    lists.push(&mut catch.tasks);
                }
                lists
            }
            _ => Vec::new(),
        }
    }

    /// Task names this config routes control to (switch cases/default)
    pub fn flow_targets(&self) -> Vec<&str> {
        match self {
            TaskConfig::Switch(c) => c
                .cases
                .iter()
                .map(|case| case.then.as_str())
                .chain(c.default_task.as_deref())
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_parse_and_format() {
        let d: Duration = "5m".parse().unwrap();
        assert_eq!(d, Duration::minutes(5));
        assert_eq!(d.to_string(), "5m");
        assert_eq!(d.as_secs(), 300);

        assert_eq!("30s".parse::<Duration>().unwrap().as_secs(), 30);
        assert_eq!(Duration::days(1).as_secs(), 86_400);
        assert_eq!(Duration::hours(2).to_string(), "2h");
    }

    #[test]
    fn test_duration_rejects_garbage() {
        for bad in ["", "s", "5", "5x", "-5s", "1.5h", "five m"] {
            let err = bad.parse::<Duration>().unwrap_err();
            assert_eq!(err.kind, ErrorKind::InvalidTaskConfig);
            assert_eq!(err.field, "duration");
        }
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!("post".parse::<HttpMethod>().unwrap(), HttpMethod::Post);
        assert_eq!(HttpMethod::Options.to_string(), "OPTIONS");
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_resource_ref_serialization() {
        let agent = ResourceRef::platform("code-reviewer");
        let json = serde_json::to_value(&agent).unwrap();
        assert_eq!(json, serde_json::json!({"slug": "code-reviewer", "scope": "platform"}));

        let bare = serde_json::to_value(ResourceRef::from("helper")).unwrap();
        assert_eq!(bare, serde_json::json!({"slug": "helper"}));
    }

    #[test]
    fn test_switch_flow_targets() {
        let config = TaskConfig::Switch(SwitchConfig {
            cases: vec![SwitchCase {
                condition: Expr::Literal(crate::expr::Scalar::Bool(true)),
                then: "a".into(),
            }],
            default_task: Some("b".into()),
        });
        assert_eq!(config.flow_targets(), vec!["a", "b"]);
        assert_eq!(config.kind(), TaskKind::Switch);
        assert!(config.nested().is_empty());
    }
}
