//! Builder pattern for ergonomic workflow construction
//!
//! Provides a fluent API for assembling a [`Workflow`] with defaults applied
//! and structural validation run once at `build()`.

use crate::environment::EnvironmentVariable;
use crate::error::Result;
use crate::naming::{generate_slug, validate_slug};
use crate::task::Task;
use crate::validator::validate_workflow;
use crate::workflow::{Document, Workflow, DEFAULT_DSL_VERSION, DEFAULT_VERSION};

// ============================================================================
// WORKFLOW BUILDER
// ============================================================================

/// Fluent builder for constructing workflows
#[derive(Debug, Clone, Default)]
pub struct WorkflowBuilder {
    namespace: String,
    name: Option<String>,
    version: Option<String>,
    description: Option<String>,
    slug: Option<String>,
    org: Option<String>,
    dsl: Option<String>,
    tasks: Vec<Task>,
    environment_variables: Vec<EnvironmentVariable>,
}

impl WorkflowBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Display name; also the source of the generated slug
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Semantic version (defaults to `0.1.0`)
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Explicit slug; when no name is given it doubles as the name
    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn org(mut self, org: impl Into<String>) -> Self {
        self.org = Some(org.into());
        self
    }

    /// DSL version of the document (defaults to `1.0.0`)
    pub fn dsl(mut self, dsl: impl Into<String>) -> Self {
        self.dsl = Some(dsl.into());
        self
    }

    pub fn task(mut self, task: impl Into<Task>) -> Self {
        self.tasks.push(task.into());
        self
    }

    pub fn tasks<I, T>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        self.tasks.extend(tasks.into_iter().map(Into::into));
        self
    }

    pub fn env_var(mut self, var: EnvironmentVariable) -> Self {
        self.environment_variables.push(var);
        self
    }

    pub fn env_vars(mut self, vars: impl IntoIterator<Item = EnvironmentVariable>) -> Self {
        self.environment_variables.extend(vars);
        self
    }

    /// Build the workflow, returning the first structural violation
    pub fn build(self) -> Result<Workflow> {
        let slug = non_empty(self.slug);
        let name = non_empty(self.name)
            .or_else(|| slug.clone())
            .unwrap_or_default();
        let slug = slug.unwrap_or_else(|| generate_slug(&name));

        let document = Document {
            dsl: non_empty(self.dsl).unwrap_or_else(|| DEFAULT_DSL_VERSION.to_string()),
            namespace: self.namespace,
            name,
            version: non_empty(self.version).unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            description: self.description,
        };

        let mut workflow = Workflow::new(document, slug, self.org);
        workflow.add_tasks(self.tasks);
        workflow.add_environment_variables(self.environment_variables);

        validate_workflow(&workflow)?;
        validate_slug(workflow.slug())?;
        Ok(workflow)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, Rule};
    use crate::task::builders::SetTask;
    use crate::task::{FieldRef, EXPORT_ALL};

    // ========================================================================
    // Defaults
    // ========================================================================

    #[test]
    fn test_defaults_applied() {
        let wf = Workflow::builder()
            .namespace("acme")
            .name("Daily Sync")
            .build()
            .unwrap();
        assert_eq!(wf.document().dsl, "1.0.0");
        assert_eq!(wf.version(), "0.1.0");
        assert_eq!(wf.slug(), "daily-sync");
        assert_eq!(wf.org(), None);
        assert!(wf.tasks().is_empty());
    }

    #[test]
    fn test_empty_version_defaulted() {
        let wf = Workflow::builder()
            .namespace("acme")
            .name("x")
            .version("")
            .build()
            .unwrap();
        assert_eq!(wf.version(), "0.1.0");
    }

    #[test]
    fn test_name_from_slug() {
        let wf = Workflow::builder()
            .namespace("acme")
            .slug("nightly-etl")
            .org("acme-corp")
            .build()
            .unwrap();
        assert_eq!(wf.name(), "nightly-etl");
        assert_eq!(wf.slug(), "nightly-etl");
        assert_eq!(wf.org(), Some("acme-corp"));
    }

    // ========================================================================
    // Validation
    // ========================================================================

    #[test]
    fn test_missing_namespace() {
        let err = Workflow::builder().name("x").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidNamespace);
        assert_eq!(err.validation().map(|v| v.rule), Some(Rule::Required));
    }

    #[test]
    fn test_missing_name() {
        let err = Workflow::builder().namespace("acme").build().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidName);
    }

    #[test]
    fn test_bad_version() {
        let err = Workflow::builder()
            .namespace("acme")
            .name("x")
            .version("1.0")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidVersion);
        assert_eq!(err.validation().map(|v| v.field.as_str()), Some("version"));
    }

    #[test]
    fn test_bad_slug() {
        let err = Workflow::builder()
            .namespace("acme")
            .name("x")
            .slug("Not A Slug")
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSlug);
    }

    #[test]
    fn test_duplicate_task_names() {
        let err = Workflow::builder()
            .namespace("acme")
            .name("x")
            .task(SetTask::new("a").var("v", 1))
            .task(SetTask::new("a").var("v", 2))
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateTaskName);
    }

    #[test]
    fn test_build_marks_exports() {
        let wf = Workflow::builder()
            .namespace("acme")
            .name("x")
            .tasks([
                SetTask::new("a").var("v", 1),
                SetTask::new("b").var("w", FieldRef::new("a", "v")),
            ])
            .build()
            .unwrap();
        assert_eq!(wf.task("a").unwrap().export_directive(), Some(EXPORT_ALL));
    }
}
