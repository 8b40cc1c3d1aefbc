//! Task nodes
//!
//! A [`Task`] is a named unit of work: a kind-specific [`TaskConfig`], an
//! optional export directive, an optional `then` pointer and the set of tasks
//! it depends on. Tasks are produced by the per-kind builders in [`builders`],
//! which track dependencies as configuration values are supplied.

pub mod builders;
pub mod config;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use builders::DependencyTracker;
pub use config::TaskConfig;

use crate::error::{ErrorKind, Rule, ValidationError};
use crate::expr::{Deferred, Expr, IntoExpr, Term};

/// `then` target that terminates the flow
pub const END_FLOW: &str = "end";

/// Export directive that makes the whole task output visible
pub const EXPORT_ALL: &str = "${.}";

const PROTO_PREFIX: &str = "WORKFLOW_TASK_KIND_";

// ============================================================================
// TASK KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskKind {
    Set,
    HttpCall,
    GrpcCall,
    Switch,
    For,
    Fork,
    Try,
    Listen,
    Wait,
    CallActivity,
    Raise,
    Run,
    AgentCall,
}

impl TaskKind {
    pub const ALL: [TaskKind; 13] = [
        TaskKind::Set,
        TaskKind::HttpCall,
        TaskKind::GrpcCall,
        TaskKind::Switch,
        TaskKind::For,
        TaskKind::Fork,
        TaskKind::Try,
        TaskKind::Listen,
        TaskKind::Wait,
        TaskKind::CallActivity,
        TaskKind::Raise,
        TaskKind::Run,
        TaskKind::AgentCall,
    ];

    /// Wire name (`HTTP_CALL`)
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Set => "SET",
            TaskKind::HttpCall => "HTTP_CALL",
            TaskKind::GrpcCall => "GRPC_CALL",
            TaskKind::Switch => "SWITCH",
            TaskKind::For => "FOR",
            TaskKind::Fork => "FORK",
            TaskKind::Try => "TRY",
            TaskKind::Listen => "LISTEN",
            TaskKind::Wait => "WAIT",
            TaskKind::CallActivity => "CALL_ACTIVITY",
            TaskKind::Raise => "RAISE",
            TaskKind::Run => "RUN",
            TaskKind::AgentCall => "AGENT_CALL",
        }
    }

    /// Fully qualified enum name (`WORKFLOW_TASK_KIND_HTTP_CALL`)
    pub fn proto_name(&self) -> String {
        format!("{}{}", PROTO_PREFIX, self.as_str())
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let name = upper.strip_prefix(PROTO_PREFIX).unwrap_or(&upper);
        TaskKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == name)
            .ok_or_else(|| {
                ValidationError::new(
                    ErrorKind::InvalidTaskKind,
                    "kind",
                    Rule::Format,
                    format!("unknown task kind '{}'", s),
                )
                .with_value(s)
            })
    }
}

// ============================================================================
// FIELD REFERENCE
// ============================================================================

/// Handle to one output field of a task
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldRef {
    task: String,
    path: String,
}

impl FieldRef {
    pub fn new(task: impl Into<String>, path: impl Into<String>) -> Self {
        let path: String = path.into();
        Self {
            task: task.into(),
            path: path.trim_start_matches('.').to_string(),
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `${ $context["<task>"].<path> }`
    pub fn expression(&self) -> String {
        self.term().expression()
    }

    pub fn term(&self) -> Term {
        Term::from(self)
    }

    pub fn equals(&self, other: impl Into<Term>) -> Term {
        self.term().equals(other)
    }

    pub fn not_equals(&self, other: impl Into<Term>) -> Term {
        self.term().not_equals(other)
    }

    pub fn greater_than(&self, other: impl Into<Term>) -> Term {
        self.term().greater_than(other)
    }

    pub fn greater_or_equal(&self, other: impl Into<Term>) -> Term {
        self.term().greater_or_equal(other)
    }

    pub fn less_than(&self, other: impl Into<Term>) -> Term {
        self.term().less_than(other)
    }

    pub fn less_or_equal(&self, other: impl Into<Term>) -> Term {
        self.term().less_or_equal(other)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression())
    }
}

impl IntoExpr for FieldRef {
    fn into_expr(self) -> Expr {
        Expr::Deferred(Deferred::with_sources(self.expression(), [self.task]))
    }
}

impl IntoExpr for &FieldRef {
    fn into_expr(self) -> Expr {
        self.clone().into_expr()
    }
}

// ============================================================================
// TASK TARGET
// ============================================================================

/// Anything that names a task (for `then` / `depends_on` / switch targets)
pub trait TaskTarget {
    fn target_name(&self) -> String;
}

impl TaskTarget for &str {
    fn target_name(&self) -> String {
        (*self).to_string()
    }
}

impl TaskTarget for String {
    fn target_name(&self) -> String {
        self.clone()
    }
}

impl TaskTarget for &String {
    fn target_name(&self) -> String {
        (*self).clone()
    }
}

impl TaskTarget for &Task {
    fn target_name(&self) -> String {
        self.name.clone()
    }
}

// ============================================================================
// TASK
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    name: String,
    config: TaskConfig,
    export: Option<String>,
    then: Option<String>,
    /// Ordered, de-duplicated
    dependencies: Vec<String>,
    /// Tasks whose fields this task (or its nested tasks) reads
    references: Vec<String>,
}

impl Task {
    pub(crate) fn from_parts(
        name: String,
        config: TaskConfig,
        tracker: DependencyTracker,
        export: Option<String>,
        then: Option<String>,
    ) -> Self {
        let (dependencies, references) = tracker.into_parts();
        Self {
            name,
            config,
            export,
            then,
            dependencies,
            references,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TaskKind {
        self.config.kind()
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    pub fn export_directive(&self) -> Option<&str> {
        self.export.as_deref()
    }

    /// Explicit `then` pointer
    pub fn next(&self) -> Option<&str> {
        self.then.as_deref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Reference one of this task's output fields. Pure: the export
    /// directive is set by the workflow once the reference is consumed.
    pub fn field(&self, path: &str) -> FieldRef {
        FieldRef::new(self.name.as_str(), path)
    }

    pub fn export(mut self, expr: impl IntoExpr) -> Self {
        self.set_export(expr);
        self
    }

    pub fn export_all(self) -> Self {
        self.export(EXPORT_ALL)
    }

    /// Export a single field of the output: `${ .<field> }`
    pub fn export_field(self, field: &str) -> Self {
        self.export(crate::expr::field(field))
    }

    pub fn then(mut self, target: impl TaskTarget) -> Self {
        self.set_then(target);
        self
    }

    pub fn end(self) -> Self {
        self.then(END_FLOW)
    }

    pub fn depends_on(mut self, target: impl TaskTarget) -> Self {
        self.add_dependency(target);
        self
    }

    pub fn set_export(&mut self, expr: impl IntoExpr) {
        self.export = Some(expr.into_expr().render());
    }

    pub fn set_then(&mut self, target: impl TaskTarget) {
        self.then = Some(target.target_name());
    }

    /// Merge an explicit dependency (no-op if already tracked)
    pub fn add_dependency(&mut self, target: impl TaskTarget) {
        let name = target.target_name();
        if !self.dependencies.contains(&name) {
            self.dependencies.push(name);
        }
    }

    /// Set the export directive to "everything" unless one is already set.
    /// Returns true when the directive changed.
    pub(crate) fn mark_exported(&mut self) -> bool {
        if self.export.is_some() {
            return false;
        }
        self.export = Some(EXPORT_ALL.to_string());
        true
    }

    pub(crate) fn config_mut(&mut self) -> &mut TaskConfig {
        &mut self.config
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task({}, kind={})", self.name, self.kind())
    }
}

/// Visit every task in `tasks`, depth first, including nested tasks
pub fn walk_tasks<'a>(tasks: &'a [Task], visit: &mut impl FnMut(&'a Task)) {
    for task in tasks {
        visit(task);
        for nested in task.config.nested() {
            walk_tasks(nested, visit);
        }
    }
}

pub(crate) fn walk_tasks_mut(tasks: &mut [Task], visit: &mut impl FnMut(&mut Task)) {
    for task in tasks.iter_mut() {
        visit(&mut *task);
        for nested in task.config_mut().nested_mut() {
            walk_tasks_mut(nested, visit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::builders::{HttpCallTask, SetTask};
    use super::*;

    #[test]
    fn test_task_kind_names() {
        assert_eq!(TaskKind::HttpCall.as_str(), "HTTP_CALL");
        assert_eq!(TaskKind::AgentCall.to_string(), "AGENT_CALL");
        assert_eq!(TaskKind::Set.proto_name(), "WORKFLOW_TASK_KIND_SET");
        assert_eq!(
            serde_json::to_value(TaskKind::CallActivity).unwrap(),
            serde_json::json!("CALL_ACTIVITY")
        );
    }

    #[test]
    fn test_task_kind_from_str() {
        assert_eq!("SET".parse::<TaskKind>().unwrap(), TaskKind::Set);
        assert_eq!("http_call".parse::<TaskKind>().unwrap(), TaskKind::HttpCall);
        assert_eq!(
            "WORKFLOW_TASK_KIND_GRPC_CALL".parse::<TaskKind>().unwrap(),
            TaskKind::GrpcCall
        );

        let err = "TELEPORT".parse::<TaskKind>().unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidTaskKind);
    }

    #[test]
    fn test_every_kind_round_trips_through_from_str() {
        for kind in TaskKind::ALL {
            assert_eq!(kind.as_str().parse::<TaskKind>().unwrap(), kind);
            assert_eq!(kind.proto_name().parse::<TaskKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_field_ref_uses_bracket_indexing() {
        let task = HttpCallTask::get("fetch-pr", "https://api.github.com").build();
        let url = task.field("url");
        assert_eq!(url.expression(), r#"${ $context["fetch-pr"].url }"#);
        assert_eq!(task.field(".body.title").path(), "body.title");
    }

    #[test]
    fn test_field_is_pure() {
        let task = SetTask::new("init").var("x", 1).build();
        let _ = task.field("x");
        let _ = task.field("y");
        assert_eq!(task.export_directive(), None);
    }

    #[test]
    fn test_field_ref_into_expr_carries_source() {
        let expr = FieldRef::new("fetch", "title").into_expr();
        assert_eq!(expr.sources().to_vec(), vec!["fetch".to_string()]);
        assert_eq!(expr.render(), r#"${ $context["fetch"].title }"#);
    }

    #[test]
    fn test_field_ref_conditions() {
        let cond = FieldRef::new("check", "status").equals(200i64);
        assert_eq!(cond.expression(), r#"${ $context["check"].status == 200 }"#);
    }

    #[test]
    fn test_flow_and_export_chain() {
        let task = SetTask::new("a")
            .var("k", "v")
            .build()
            .export_field("result")
            .then("b")
            .depends_on("z")
            .depends_on("z");

        assert_eq!(task.export_directive(), Some("${ .result }"));
        assert_eq!(task.next(), Some("b"));
        assert_eq!(task.dependencies(), ["z".to_string()].as_slice());

        let ended = task.end();
        assert_eq!(ended.next(), Some(END_FLOW));
    }

    #[test]
    fn test_mark_exported_respects_explicit_export() {
        let mut task = SetTask::new("a").var("k", "v").build().export_field("only");
        assert!(!task.mark_exported());
        assert_eq!(task.export_directive(), Some("${ .only }"));

        let mut plain = SetTask::new("b").var("k", "v").build();
        assert!(plain.mark_exported());
        assert!(!plain.mark_exported());
        assert_eq!(plain.export_directive(), Some(EXPORT_ALL));
    }
}
