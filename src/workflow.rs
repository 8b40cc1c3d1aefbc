//! Workflow container
//!
//! A [`Workflow`] owns the ordered task list and the declared environment
//! inputs. Adding a task records which tasks it reads; any task whose output
//! is read gets an export directive so the engine keeps that output around.

use std::collections::BTreeSet;
use std::fmt;

use tracing::trace;

use crate::builders::WorkflowBuilder;
use crate::context::Context;
use crate::convert::Converter;
use crate::environment::EnvironmentVariable;
use crate::error::Result;
use crate::expr::IntoExpr;
use crate::manifest::WorkflowManifest;
use crate::task::builders::{AgentCallTask, HttpCallTask, SetTask};
use crate::task::config::{AgentRef, HttpMethod};
use crate::task::{walk_tasks, walk_tasks_mut, FieldRef, Task, TaskTarget};

pub const DEFAULT_DSL_VERSION: &str = "1.0.0";
pub const DEFAULT_VERSION: &str = "0.1.0";

/// Workflow identity, serialized as the manifest's `document` block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub dsl: String,
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub description: Option<String>,
}

/// Ordered task graph plus declared inputs
#[derive(Debug, Clone)]
pub struct Workflow {
    document: Document,
    slug: String,
    org: Option<String>,
    tasks: Vec<Task>,
    environment_variables: Vec<EnvironmentVariable>,
    /// Every task name some task reads a field of
    referenced: BTreeSet<String>,
}

impl Workflow {
    pub fn builder() -> WorkflowBuilder {
        WorkflowBuilder::new()
    }

    pub(crate) fn new(document: Document, slug: String, org: Option<String>) -> Self {
        Self {
            document,
            slug,
            org,
            tasks: Vec::new(),
            environment_variables: Vec::new(),
            referenced: BTreeSet::new(),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn namespace(&self) -> &str {
        &self.document.namespace
    }

    pub fn name(&self) -> &str {
        &self.document.name
    }

    pub fn version(&self) -> &str {
        &self.document.version
    }

    pub fn description(&self) -> Option<&str> {
        self.document.description.as_deref()
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn org(&self) -> Option<&str> {
        self.org.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Look a task up by name at any nesting depth
    pub fn task(&self, name: &str) -> Option<&Task> {
        let mut found = None;
        walk_tasks(&self.tasks, &mut |t| {
            if found.is_none() && t.name() == name {
                found = Some(t);
            }
        });
        found
    }

    pub fn environment_variables(&self) -> &[EnvironmentVariable] {
        &self.environment_variables
    }

    // ========================================================================
    // Adding tasks
    // ========================================================================

    /// Append a task and refresh export directives
    pub fn add_task(&mut self, task: impl Into<Task>) -> TaskHandle {
        let task = task.into();
        let handle = TaskHandle::new(task.name());
        self.referenced.extend(task.references().iter().cloned());
        self.tasks.push(task);
        self.mark_referenced_exports();
        handle
    }

    pub fn add_tasks<I, T>(&mut self, tasks: I) -> Vec<TaskHandle>
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        tasks.into_iter().map(|t| self.add_task(t)).collect()
    }

    pub fn add_environment_variable(&mut self, var: EnvironmentVariable) {
        self.environment_variables.push(var);
    }

    pub fn add_environment_variables(&mut self, vars: impl IntoIterator<Item = EnvironmentVariable>) {
        self.environment_variables.extend(vars);
    }

    /// Tasks can be read before they are added, so every add re-checks all tasks
    fn mark_referenced_exports(&mut self) {
        let referenced = &self.referenced;
        walk_tasks_mut(&mut self.tasks, &mut |task| {
            if referenced.contains(task.name()) && task.mark_exported() {
                trace!(task = task.name(), "exporting referenced task output");
            }
        });
    }

    // ========================================================================
    // Convenience builders
    // ========================================================================

    pub fn http_get<F>(&mut self, name: &str, uri: impl IntoExpr, configure: F) -> TaskHandle
    where
        F: FnOnce(HttpCallTask) -> HttpCallTask,
    {
        self.http(name, HttpMethod::Get, uri, configure)
    }

    pub fn http_post<F>(&mut self, name: &str, uri: impl IntoExpr, configure: F) -> TaskHandle
    where
        F: FnOnce(HttpCallTask) -> HttpCallTask,
    {
        self.http(name, HttpMethod::Post, uri, configure)
    }

    pub fn http_put<F>(&mut self, name: &str, uri: impl IntoExpr, configure: F) -> TaskHandle
    where
        F: FnOnce(HttpCallTask) -> HttpCallTask,
    {
        self.http(name, HttpMethod::Put, uri, configure)
    }

    pub fn http_patch<F>(&mut self, name: &str, uri: impl IntoExpr, configure: F) -> TaskHandle
    where
        F: FnOnce(HttpCallTask) -> HttpCallTask,
    {
        self.http(name, HttpMethod::Patch, uri, configure)
    }

    pub fn http_delete<F>(&mut self, name: &str, uri: impl IntoExpr, configure: F) -> TaskHandle
    where
        F: FnOnce(HttpCallTask) -> HttpCallTask,
    {
        self.http(name, HttpMethod::Delete, uri, configure)
    }

    fn http<F>(&mut self, name: &str, method: HttpMethod, uri: impl IntoExpr, configure: F) -> TaskHandle
    where
        F: FnOnce(HttpCallTask) -> HttpCallTask,
    {
        self.add_task(configure(HttpCallTask::new(name, method, uri)))
    }

    pub fn set<F>(&mut self, name: &str, configure: F) -> TaskHandle
    where
        F: FnOnce(SetTask) -> SetTask,
    {
        self.add_task(configure(SetTask::new(name)))
    }

    pub fn call_agent<F>(
        &mut self,
        name: &str,
        agent: impl Into<AgentRef>,
        message: impl IntoExpr,
        configure: F,
    ) -> TaskHandle
    where
        F: FnOnce(AgentCallTask) -> AgentCallTask,
    {
        self.add_task(configure(AgentCallTask::new(name, agent, message)))
    }

    // ========================================================================
    // Output
    // ========================================================================

    pub fn validate(&self) -> Result<()> {
        crate::validator::validate_workflow(self)
    }

    /// Convert with the shared schema validator
    pub fn to_manifest(&self) -> Result<WorkflowManifest> {
        Converter::new()?.convert(self)
    }

    /// Convert, interpolating `${name}` placeholders from `context`
    pub fn to_manifest_with_context(&self, context: &Context) -> Result<WorkflowManifest> {
        Converter::new()?.with_context(context).convert(self)
    }
}

impl fmt::Display for Workflow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Workflow(namespace={}, name={}, version={})",
            self.document.namespace, self.document.name, self.document.version
        )
    }
}

/// Name of a task already added to a workflow
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    name: String,
}

impl TaskHandle {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(&self, path: &str) -> FieldRef {
        FieldRef::new(self.name.as_str(), path)
    }
}

impl TaskTarget for &TaskHandle {
    fn target_name(&self) -> String {
        self.name.clone()
    }
}

impl TaskTarget for TaskHandle {
    fn target_name(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::builders::{ForTask, TryTask};
    use crate::task::EXPORT_ALL;
    use pretty_assertions::assert_eq;

    fn workflow() -> Workflow {
        Workflow::builder()
            .namespace("acme")
            .name("sync")
            .build()
            .unwrap()
    }

    // ========================================================================
    // Export marking
    // ========================================================================

    #[test]
    fn test_referenced_task_exported() {
        let mut wf = workflow();
        let fetch = wf.http_get("fetch", "https://api.example.com/items", |t| t);
        wf.set("store", |t| t.var("count", fetch.field("total")));

        let fetch = wf.task("fetch").unwrap();
        assert_eq!(fetch.export_directive(), Some(EXPORT_ALL));
        assert_eq!(wf.task("store").unwrap().export_directive(), None);
        assert_eq!(wf.task("store").unwrap().dependencies().to_vec(), vec!["fetch".to_string()]);
    }

    #[test]
    fn test_explicit_export_preserved() {
        let mut wf = workflow();
        wf.add_task(HttpCallTask::get("fetch", "https://x.test").export_field("data"));
        wf.set("use", |t| t.var("v", FieldRef::new("fetch", "data")));
        assert_eq!(wf.task("fetch").unwrap().export_directive(), Some("${ .data }"));
    }

    #[test]
    fn test_reference_before_add_marks_later() {
        let mut wf = workflow();
        wf.set("reader", |t| t.var("v", FieldRef::new("writer", "x")));
        wf.set("writer", |t| t.var("x", 1));
        assert_eq!(wf.task("writer").unwrap().export_directive(), Some(EXPORT_ALL));
    }

    #[test]
    fn test_nested_references_mark_exports() {
        let mut wf = workflow();
        wf.set("config", |t| t.var("limit", 10));
        wf.add_task(
            TryTask::new("guarded")
                .task(SetTask::new("inner").var("l", FieldRef::new("config", "limit"))),
        );
        wf.add_task(
            ForTask::new("loop")
                .over("${ .items }")
                .task(SetTask::new("step").var("x", 1)),
        );
        wf.set("after", |t| t.var("s", FieldRef::new("step", "x")));

        assert_eq!(wf.task("config").unwrap().export_directive(), Some(EXPORT_ALL));
        assert_eq!(wf.task("step").unwrap().export_directive(), Some(EXPORT_ALL));
        assert_eq!(wf.task("inner").unwrap().export_directive(), None);
    }

    // ========================================================================
    // Handles and accessors
    // ========================================================================

    #[test]
    fn test_handles_as_targets() {
        let mut wf = workflow();
        let a = wf.set("a", |t| t.var("x", 1));
        let b = wf.add_task(SetTask::new("b").var("y", 2).depends_on(&a));
        wf.add_task(SetTask::new("c").var("z", 3).then(&b));

        assert_eq!(wf.task("b").unwrap().dependencies().to_vec(), vec!["a".to_string()]);
        assert_eq!(wf.task("c").unwrap().next(), Some("b"));
        assert_eq!(a.field("x").expression(), r#"${ $context["a"].x }"#);
    }

    #[test]
    fn test_add_tasks_and_env() {
        let mut wf = workflow();
        let handles = wf.add_tasks([SetTask::new("a").var("x", 1), SetTask::new("b").var("x", 2)]);
        assert_eq!(handles.iter().map(TaskHandle::name).collect::<Vec<_>>(), vec!["a", "b"]);

        wf.add_environment_variable(EnvironmentVariable::builder("TOKEN").secret().build().unwrap());
        assert_eq!(wf.environment_variables().len(), 1);
        assert_eq!(wf.tasks().len(), 2);
        assert_eq!(wf.to_string(), "Workflow(namespace=acme, name=sync, version=0.1.0)");
    }
}
