//! Config-to-wire conversion
//!
//! Turns a validated [`Workflow`] into a [`WorkflowManifest`]:
//! 1. structural revalidation, non-empty check, graph closure
//! 2. per task: render every `Expr`, interpolate `${name}` context values,
//!    audit runtime placeholders, validate against the kind's schema
//! 3. whole-manifest schema validation
//!
//! Every string written here goes through [`Expr::render`] or
//! [`Expr::to_json`], so deferred placeholders reach the wire verbatim.

use std::collections::BTreeMap;

use serde_json::{json, Map, Number, Value};
use tracing::{debug, instrument, trace};

use crate::context::Context;
use crate::error::{ConversionError, ErrorKind, Result, Rule, TaskGraphError, ValidationError};
use crate::expr::runtime::malformed_runtime_refs;
use crate::expr::Expr;
use crate::manifest::{
    DocumentSpec, EnvSpec, EnvValue, Export, FlowControl, ManifestBundle, Metadata, SdkMetadata,
    WireTask, WorkflowManifest, WorkflowSpec, API_VERSION, KIND, LANGUAGE_ANNOTATION,
    SDK_LANGUAGE, SDK_VERSION, VERSION_ANNOTATION,
};
use crate::schema::SchemaValidator;
use crate::task::config::{ExprMap, ResourceScope, TaskConfig};
use crate::task::Task;
use crate::template::TEMPLATE_RESOLVER;
use crate::validator::{validate_references, validate_workflow};
use crate::workflow::Workflow;

/// Workflow → manifest converter
#[derive(Debug, Clone, Copy)]
pub struct Converter<'a> {
    validator: &'a SchemaValidator,
    context: Option<&'a Context>,
}

impl<'a> Converter<'a> {
    /// Converter backed by the shared schema validator
    pub fn new() -> Result<Self> {
        Ok(Self {
            validator: SchemaValidator::shared()?,
            context: None,
        })
    }

    pub fn with_validator(validator: &'a SchemaValidator) -> Self {
        Self {
            validator,
            context: None,
        }
    }

    /// Interpolate `${name}` placeholders from `context` during conversion
    pub fn with_context(mut self, context: &'a Context) -> Self {
        self.context = Some(context);
        self
    }

    #[instrument(skip_all, fields(workflow = %workflow.name(), tasks = workflow.tasks().len()))]
    pub fn convert(&self, workflow: &Workflow) -> Result<WorkflowManifest> {
        debug!("converting workflow");

        validate_workflow(workflow)?;
        if workflow.tasks().is_empty() {
            return Err(ValidationError::new(
                ErrorKind::NoTasks,
                "tasks",
                Rule::Required,
                "workflow must contain at least one task",
            )
            .into());
        }
        validate_references(workflow.tasks())?;

        let mut tasks = Vec::with_capacity(workflow.tasks().len());
        for (i, task) in workflow.tasks().iter().enumerate() {
            let wire = self.convert_task(task).map_err(|cause| {
                ConversionError::new(
                    "WorkflowTask",
                    format!("tasks[{}]", i),
                    format!("task '{}' ({})", task.name(), task.kind()),
                )
                .with_cause(cause)
            })?;
            tasks.push(wire);
        }

        let manifest = WorkflowManifest {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: metadata(workflow),
            spec: WorkflowSpec {
                description: workflow.description().map(str::to_string),
                document: DocumentSpec {
                    dsl: workflow.document().dsl.clone(),
                    namespace: workflow.namespace().to_string(),
                    name: workflow.name().to_string(),
                    version: workflow.version().to_string(),
                    description: workflow.description().map(str::to_string),
                },
                tasks,
                env_spec: env_spec(workflow),
            },
        };

        let value = manifest.to_json_value()?;
        self.validator
            .validate_manifest(&value)
            .map_err(|error| TaskGraphError::ManifestSchema { error })?;

        debug!(tasks = manifest.spec.tasks.len(), "workflow converted");
        Ok(manifest)
    }

    /// Convert one task (and, recursively, its nested tasks)
    fn convert_task(&self, task: &Task) -> Result<WireTask> {
        let task_config = self.render_config(task.config())?;

        if let Some(bad) = find_malformed_refs(&task_config).into_iter().next() {
            return Err(ValidationError::new(
                ErrorKind::InvalidRuntimeReference,
                "task_config",
                Rule::Format,
                format!(
                    "malformed runtime reference '{}': expected ${{.secrets.KEY}} or ${{.env_vars.NAME}}",
                    bad
                ),
            )
            .with_value(&bad)
            .into());
        }

        self.validator
            .validate_task_config(task.kind(), &task_config)
            .map_err(|error| TaskGraphError::TaskSchema {
                task: task.name().to_string(),
                kind: task.kind(),
                error,
            })?;

        trace!(task = task.name(), kind = %task.kind(), "converted task");
        Ok(WireTask {
            name: task.name().to_string(),
            kind: task.kind(),
            task_config,
            export: task.export_directive().map(|directive| Export {
                directive: directive.to_string(),
            }),
            flow: task.next().map(|then| FlowControl {
                then: then.to_string(),
            }),
        })
    }

    // ========================================================================
    // Per-kind payloads
    // ========================================================================

    fn render_config(&self, config: &TaskConfig) -> Result<Value> {
        let mut out = Map::new();
        match config {
            TaskConfig::Set(c) => {
                out.insert("variables".into(), self.string_map(&c.variables)?);
            }
            TaskConfig::HttpCall(c) => {
                out.insert("method".into(), json!(c.method.as_str()));
                out.insert("endpoint".into(), json!({ "uri": self.string(&c.uri)? }));
                if !c.headers.is_empty() {
                    out.insert("headers".into(), self.string_map(&c.headers)?);
                }
                if let Some(body) = &c.body {
                    out.insert("body".into(), self.json(body)?);
                } else if !c.body_fields.is_empty() {
                    out.insert("body".into(), self.json_map(&c.body_fields)?);
                }
                if c.timeout_seconds > 0 {
                    out.insert("timeout_seconds".into(), json!(c.timeout_seconds));
                }
            }
            TaskConfig::GrpcCall(c) => {
                out.insert("service".into(), self.text(&c.service)?);
                out.insert("method".into(), self.text(&c.method)?);
                if !c.body.is_empty() {
                    out.insert("body".into(), self.json_map(&c.body)?);
                }
            }
            TaskConfig::Switch(c) => {
                let mut cases = Vec::with_capacity(c.cases.len() + 1);
                for (i, case) in c.cases.iter().enumerate() {
                    cases.push(json!({
                        "name": format!("case{}", i + 1),
                        "when": self.string(&case.condition)?,
                        "then": case.then,
                    }));
                }
                if let Some(default) = &c.default_task {
                    cases.push(json!({ "name": "default", "when": "", "then": default }));
                }
                out.insert("cases".into(), Value::Array(cases));
            }
            TaskConfig::For(c) => {
                out.insert("each".into(), json!(c.each));
                if let Some(over) = &c.over {
                    out.insert("in".into(), Value::String(self.string(over)?));
                }
                out.insert("do".into(), self.nested(&c.tasks)?);
            }
            TaskConfig::Fork(c) => {
                let mut branches = Vec::with_capacity(c.branches.len());
                for branch in &c.branches {
                    branches.push(json!({
                        "name": branch.name,
                        "do": self.nested(&branch.tasks)?,
                    }));
                }
                out.insert("branches".into(), Value::Array(branches));
                if c.compete {
                    out.insert("compete".into(), Value::Bool(true));
                }
            }
            TaskConfig::Try(c) => {
                out.insert("try".into(), self.nested(&c.tasks)?);
                if let Some(catch) = &c.catch {
                    let mut block = Map::new();
                    if !catch.as_var.is_empty() {
                        block.insert("as".into(), json!(catch.as_var));
                    }
                    if !catch.errors.is_empty() {
                        block.insert("errors".into(), json!(catch.errors));
                    }
                    block.insert("do".into(), self.nested(&catch.tasks)?);
                    out.insert("catch".into(), Value::Object(block));
                }
            }
            TaskConfig::Listen(c) => {
                out.insert("event".into(), self.text(&c.event)?);
            }
            TaskConfig::Wait(c) => {
                out.insert("duration".into(), json!(c.duration.to_string()));
            }
            TaskConfig::CallActivity(c) => {
                out.insert("activity".into(), self.text(&c.activity)?);
                if !c.input.is_empty() {
                    out.insert("input".into(), self.json_map(&c.input)?);
                }
            }
            TaskConfig::Raise(c) => {
                out.insert("error".into(), self.text(&c.error)?);
                if let Some(message) = &c.message {
                    out.insert("message".into(), Value::String(self.string(message)?));
                }
                if !c.data.is_empty() {
                    out.insert("data".into(), self.json_map(&c.data)?);
                }
            }
            TaskConfig::Run(c) => {
                out.insert("workflow".into(), self.text(&c.workflow)?);
                if !c.input.is_empty() {
                    out.insert("input".into(), self.json_map(&c.input)?);
                }
            }
            TaskConfig::AgentCall(c) => {
                out.insert("agent".into(), self.text(&c.agent.slug)?);
                if let Some(scope) = c.agent.scope {
                    out.insert("scope".into(), json!(scope.as_str()));
                }
                out.insert("message".into(), Value::String(self.string(&c.message)?));
                if !c.env.is_empty() {
                    out.insert("env".into(), self.string_map(&c.env)?);
                }

                let mut settings = Map::new();
                if let Some(model) = &c.model {
                    settings.insert("model".into(), self.text(model)?);
                }
                if c.timeout_seconds > 0 {
                    settings.insert("timeout".into(), json!(c.timeout_seconds));
                }
                if let Some(temperature) = c.temperature {
                    let number = Number::from_f64(temperature).ok_or_else(|| {
                        ValidationError::new(
                            ErrorKind::InvalidTaskConfig,
                            "config.temperature",
                            Rule::Format,
                            "temperature must be a finite number",
                        )
                        .with_value(temperature)
                    })?;
                    settings.insert("temperature".into(), Value::Number(number));
                }
                if !settings.is_empty() {
                    out.insert("config".into(), Value::Object(settings));
                }

                if !c.skills.is_empty() {
                    let skills = serde_json::to_value(&c.skills)
                        .map_err(TaskGraphError::serialization)?;
                    out.insert("skills".into(), skills);
                }
            }
        }
        Ok(Value::Object(out))
    }

    /// Nested tasks share the top-level shape with snake_case keys
    fn nested(&self, tasks: &[Task]) -> Result<Value> {
        let mut out = Vec::with_capacity(tasks.len());
        for task in tasks {
            let wire = self.convert_task(task)?;
            let mut entry = Map::new();
            entry.insert("name".into(), json!(wire.name));
            entry.insert("kind".into(), json!(wire.kind.as_str()));
            entry.insert("task_config".into(), wire.task_config);
            if let Some(export) = wire.export {
                entry.insert("export".into(), json!({ "as": export.directive }));
            }
            if let Some(flow) = wire.flow {
                entry.insert("flow".into(), json!({ "then": flow.then }));
            }
            out.push(Value::Object(entry));
        }
        Ok(Value::Array(out))
    }

    // ========================================================================
    // Value rendering
    // ========================================================================

    /// String-typed wire field
    fn string(&self, expr: &Expr) -> Result<String> {
        match self.interpolate(Value::String(expr.render()))? {
            Value::String(s) => Ok(s),
            other => Ok(Expr::Known(other).render()),
        }
    }

    /// Plain string setting (service names, event types, ...)
    fn text(&self, s: &str) -> Result<Value> {
        self.interpolate(Value::String(s.to_string())).map(|v| match v {
            Value::String(s) => Value::String(s),
            other => Value::String(Expr::Known(other).render()),
        })
    }

    /// Payload field that keeps its JSON type
    fn json(&self, expr: &Expr) -> Result<Value> {
        self.interpolate(expr.to_json())
    }

    fn string_map(&self, map: &ExprMap) -> Result<Value> {
        let mut out = Map::with_capacity(map.len());
        for (k, v) in map {
            out.insert(k.clone(), Value::String(self.string(v)?));
        }
        Ok(Value::Object(out))
    }

    fn json_map(&self, map: &ExprMap) -> Result<Value> {
        let mut out = Map::with_capacity(map.len());
        for (k, v) in map {
            out.insert(k.clone(), self.json(v)?);
        }
        Ok(Value::Object(out))
    }

    fn interpolate(&self, value: Value) -> Result<Value> {
        match self.context {
            Some(ctx) => TEMPLATE_RESOLVER.resolve_value(&value, ctx.variables()),
            None => Ok(value),
        }
    }
}

fn find_malformed_refs(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => malformed_runtime_refs(s),
        Value::Array(items) => items.iter().flat_map(find_malformed_refs).collect(),
        Value::Object(map) => map.values().flat_map(find_malformed_refs).collect(),
        _ => Vec::new(),
    }
}

fn metadata(workflow: &Workflow) -> Metadata {
    Metadata {
        name: workflow.name().to_string(),
        slug: workflow.slug().to_string(),
        org: workflow.org().map(str::to_string),
        annotations: BTreeMap::from([
            (LANGUAGE_ANNOTATION.to_string(), SDK_LANGUAGE.to_string()),
            (VERSION_ANNOTATION.to_string(), SDK_VERSION.to_string()),
        ]),
        owner_scope: ResourceScope::Organization,
    }
}

fn env_spec(workflow: &Workflow) -> Option<EnvSpec> {
    if workflow.environment_variables().is_empty() {
        return None;
    }
    let data = workflow
        .environment_variables()
        .iter()
        .map(|var| {
            (
                var.name().to_string(),
                EnvValue {
                    value: var.default_value().map(str::to_string),
                    is_secret: var.is_secret(),
                    description: var.description().map(str::to_string),
                },
            )
        })
        .collect();
    Some(EnvSpec { data })
}

/// Convert several workflows into one bundle stamped with SDK provenance
pub fn synthesize(workflows: &[&Workflow], context: Option<&Context>) -> Result<ManifestBundle> {
    if workflows.is_empty() {
        return Err(ConversionError::new(
            "ManifestBundle",
            "workflows",
            "at least one workflow is required",
        )
        .into());
    }

    let mut converter = Converter::new()?;
    if let Some(ctx) = context {
        converter = converter.with_context(ctx);
    }

    let manifests = workflows
        .iter()
        .map(|wf| converter.convert(wf))
        .collect::<Result<Vec<_>>>()?;

    debug!(workflows = manifests.len(), "synthesized manifest bundle");
    Ok(ManifestBundle {
        sdk_metadata: SdkMetadata::current(),
        workflows: manifests,
    })
}
