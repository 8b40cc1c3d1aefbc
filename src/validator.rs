//! Structural validation
//!
//! Two layers, both fail-fast:
//! - Layer 1: document and task-name rules, run when a workflow is built
//! - Layer 2: graph closure (targets exist, dependencies acyclic), run at conversion

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;

use crate::environment::EnvironmentVariable;
use crate::error::{ErrorKind, Result, Rule, ValidationError};
use crate::flow_graph::FlowGraph;
use crate::task::{walk_tasks, Task, END_FLOW};
use crate::workflow::{Document, Workflow};

pub const TASK_NAME_MAX_LENGTH: usize = 100;

static TASK_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

/// Semantic Versioning 2.0.0
static SEMVER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(?:-((?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*)(?:\.(?:0|[1-9]\d*|\d*[a-zA-Z-][0-9a-zA-Z-]*))*))?(?:\+([0-9a-zA-Z-]+(?:\.[0-9a-zA-Z-]+)*))?$",
    )
    .unwrap()
});

pub fn is_semver(version: &str) -> bool {
    SEMVER_RE.is_match(version)
}

/// Layer 1: everything checkable without following edges
pub fn validate_workflow(workflow: &Workflow) -> Result<()> {
    validate_document(workflow.document())?;
    validate_task_names(workflow.tasks())?;
    validate_environment(workflow.environment_variables())
}

pub fn validate_document(document: &Document) -> Result<()> {
    if document.namespace.trim().is_empty() {
        return Err(ValidationError::new(
            ErrorKind::InvalidNamespace,
            "namespace",
            Rule::Required,
            "namespace is required",
        )
        .into());
    }
    if document.name.trim().is_empty() {
        return Err(ValidationError::new(
            ErrorKind::InvalidName,
            "name",
            Rule::Required,
            "name is required",
        )
        .into());
    }
    if !is_semver(&document.version) {
        return Err(ValidationError::new(
            ErrorKind::InvalidVersion,
            "version",
            Rule::Format,
            "version must be a semantic version (e.g. 1.0.0)",
        )
        .with_value(&document.version)
        .into());
    }
    Ok(())
}

/// Name rules per task, then global uniqueness (nested tasks included)
pub fn validate_task_names(tasks: &[Task]) -> Result<()> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();

    for (i, task) in tasks.iter().enumerate() {
        let field = format!("tasks[{}].name", i);
        check_task_name(task.name(), &field)?;
        if !seen.insert(task.name()) {
            return Err(duplicate(task.name(), &field));
        }

        let mut nested: Vec<&Task> = Vec::new();
        for list in task.config().nested() {
            walk_tasks(list, &mut |t| nested.push(t));
        }
        let field = format!("tasks[{}]", i);
        for inner in nested {
            check_task_name(inner.name(), &field).map_err(|e| {
                ValidationError::new(
                    ErrorKind::InvalidTaskName,
                    &field,
                    e.validation().map_or(Rule::Format, |v| v.rule),
                    format!("nested task '{}': {}", inner.name(), message_of(&e)),
                )
                .with_value(inner.name())
            })?;
            if !seen.insert(inner.name()) {
                return Err(duplicate(inner.name(), &field));
            }
        }
    }
    Ok(())
}

fn check_task_name(name: &str, field: &str) -> Result<()> {
    let (rule, message) = if name.is_empty() {
        (Rule::Required, "task name is required".to_string())
    } else if name.chars().count() > TASK_NAME_MAX_LENGTH {
        (
            Rule::MaxLength,
            format!("task name exceeds {} characters", TASK_NAME_MAX_LENGTH),
        )
    } else if !TASK_NAME_RE.is_match(name) {
        (
            Rule::Format,
            "task name may only contain letters, digits, '_' and '-'".to_string(),
        )
    } else {
        return Ok(());
    };
    Err(ValidationError::new(ErrorKind::InvalidTaskName, field, rule, message)
        .with_value(name)
        .into())
}

fn duplicate(name: &str, field: &str) -> crate::error::TaskGraphError {
    ValidationError::new(
        ErrorKind::DuplicateTaskName,
        field,
        Rule::Unique,
        format!("duplicate task name '{}'", name),
    )
    .with_value(name)
    .into()
}

fn message_of(err: &crate::error::TaskGraphError) -> String {
    err.validation()
        .map_or_else(|| err.to_string(), |v| v.message.clone())
}

pub fn validate_environment(vars: &[EnvironmentVariable]) -> Result<()> {
    let mut seen: FxHashSet<&str> = FxHashSet::default();
    for (i, var) in vars.iter().enumerate() {
        if !seen.insert(var.name()) {
            return Err(ValidationError::new(
                ErrorKind::InvalidEnvironmentVariable,
                format!("environment_variables[{}].name", i),
                Rule::Unique,
                format!("duplicate environment variable '{}'", var.name()),
            )
            .with_value(var.name())
            .into());
        }
    }
    Ok(())
}

/// Layer 2: every named target exists and dependencies form a DAG
pub fn validate_references(tasks: &[Task]) -> Result<()> {
    let graph = FlowGraph::from_tasks(tasks);

    for (i, top) in tasks.iter().enumerate() {
        let mut scope: Vec<&Task> = vec![top];
        for list in top.config().nested() {
            walk_tasks(list, &mut |t| scope.push(t));
        }

        for task in scope {
            let nested = task.name() != top.name();
            let at = |suffix: &str| {
                if nested {
                    format!("tasks[{}]", i)
                } else {
                    format!("tasks[{}].{}", i, suffix)
                }
            };

            if let Some(next) = task.next() {
                if next != END_FLOW && !graph.contains(next) {
                    return Err(unknown(task, next, "then", at("flow.then")));
                }
            }
            for target in task.config().flow_targets() {
                if target != END_FLOW && !graph.contains(target) {
                    return Err(unknown(task, target, "switch", at("task_config.cases")));
                }
            }
            for dep in task.dependencies() {
                if !graph.contains(dep) {
                    return Err(unknown(task, dep, "dependency", at("depends_on")));
                }
            }
        }
    }

    if let Some(cycle) = graph.find_cycle() {
        let path = cycle
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(ValidationError::new(
            ErrorKind::DependencyCycle,
            "tasks",
            Rule::Acyclic,
            format!("dependency cycle: {}", path),
        )
        .with_value(&path)
        .into());
    }
    Ok(())
}

fn unknown(task: &Task, target: &str, edge: &str, field: String) -> crate::error::TaskGraphError {
    ValidationError::new(
        ErrorKind::UnknownTaskReference,
        field,
        Rule::Exists,
        format!(
            "task '{}' has {} target '{}' which does not exist",
            task.name(),
            edge,
            target
        ),
    )
    .with_value(target)
    .into()
}
