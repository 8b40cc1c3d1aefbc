//! Builder patterns for ergonomic task construction
//!
//! One fluent builder per task kind. Every setter that accepts a value coerces
//! it once into an [`Expr`] and shows it to the builder's
//! [`DependencyTracker`], so reading another task's field records the edge
//! without the caller declaring anything.

use super::config::{
    AgentCallConfig, AgentRef, CallActivityConfig, CatchBlock, Duration, ExprMap, ForConfig,
    ForkBranch, ForkConfig, GrpcCallConfig, HttpCallConfig, HttpMethod, ListenConfig,
    RaiseConfig, RunConfig, SetConfig, SkillRef, SwitchCase, SwitchConfig, TaskConfig,
    TryConfig, WaitConfig,
};
use super::{walk_tasks, Task, TaskTarget, END_FLOW, EXPORT_ALL};
use crate::expr::{field, Expr, IntoExpr, Term};

/// Default loop variable of a FOR task
pub const DEFAULT_LOOP_VAR: &str = "item";

// ============================================================================
// DEPENDENCY TRACKER
// ============================================================================

/// Explicit builder context that collects dependency edges as data
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DependencyTracker {
    dependencies: Vec<String>,
    references: Vec<String>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every task the expression reads (idempotent)
    pub fn observe(&mut self, expr: &Expr) {
        for source in expr.sources() {
            push_unique(&mut self.references, source);
            push_unique(&mut self.dependencies, source);
        }
    }

    /// Merge what nested tasks read. Dependencies between tasks inside the
    /// nested lists stay inside; edges leaving them propagate.
    pub fn observe_nested(&mut self, lists: &[&[Task]]) {
        let mut inner: Vec<&str> = Vec::new();
        for tasks in lists {
            walk_tasks(tasks, &mut |t| inner.push(t.name()));
        }

        for tasks in lists {
            walk_tasks(tasks, &mut |t| {
                for reference in t.references() {
                    push_unique(&mut self.references, reference);
                }
                for dep in t.dependencies() {
                    if !inner.contains(&dep.as_str()) {
                        push_unique(&mut self.dependencies, dep);
                    }
                }
            });
        }
    }

    /// Explicit ordering edge with no data flow
    pub fn depend_on(&mut self, name: &str) {
        push_unique(&mut self.dependencies, name);
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    pub(crate) fn into_parts(self) -> (Vec<String>, Vec<String>) {
        (self.dependencies, self.references)
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

/// Name, flow and export settings shared by every builder
#[derive(Debug, Clone)]
struct TaskCommon {
    name: String,
    tracker: DependencyTracker,
    export: Option<String>,
    then: Option<String>,
}

impl TaskCommon {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracker: DependencyTracker::new(),
            export: None,
            then: None,
        }
    }

    /// Coerce and observe
    fn expr(&mut self, value: impl IntoExpr) -> Expr {
        let expr = value.into_expr();
        self.tracker.observe(&expr);
        expr
    }

    fn insert(&mut self, map: &mut ExprMap, key: impl Into<String>, value: impl IntoExpr) {
        let expr = self.expr(value);
        map.insert(key.into(), expr);
    }

    fn into_task(mut self, config: TaskConfig) -> Task {
        self.tracker.observe_nested(&config.nested());
        // nested tasks may read the enclosing task's own context
        self.tracker.dependencies.retain(|d| *d != self.name);
        Task::from_parts(self.name, config, self.tracker, self.export, self.then)
    }
}

macro_rules! task_builder {
    ($($builder:ident => $variant:ident),* $(,)?) => {
        $(
            impl $builder {
                pub fn name(&self) -> &str {
                    &self.common.name
                }

                /// Export an expression over this task's output
                pub fn export(mut self, expr: impl IntoExpr) -> Self {
                    self.common.export = Some(expr.into_expr().render());
                    self
                }

                pub fn export_all(self) -> Self {
                    self.export(EXPORT_ALL)
                }

                pub fn export_field(self, name: &str) -> Self {
                    self.export(field(name))
                }

                pub fn then(mut self, target: impl TaskTarget) -> Self {
                    self.common.then = Some(target.target_name());
                    self
                }

                pub fn end(self) -> Self {
                    self.then(END_FLOW)
                }

                /// Ordering edge with no data flow
                pub fn depends_on(mut self, target: impl TaskTarget) -> Self {
                    self.common.tracker.depend_on(&target.target_name());
                    self
                }

                pub fn build(self) -> Task {
                    self.common.into_task(TaskConfig::$variant(self.config))
                }
            }

            impl From<$builder> for Task {
                fn from(builder: $builder) -> Task {
                    builder.build()
                }
            }
        )*
    };
}

task_builder! {
    SetTask => Set,
    HttpCallTask => HttpCall,
    GrpcCallTask => GrpcCall,
    SwitchTask => Switch,
    ForTask => For,
    ForkTask => Fork,
    TryTask => Try,
    ListenTask => Listen,
    WaitTask => Wait,
    CallActivityTask => CallActivity,
    RaiseTask => Raise,
    RunTask => Run,
    AgentCallTask => AgentCall,
}

fn collect_tasks<I, T>(tasks: I) -> Vec<Task>
where
    I: IntoIterator<Item = T>,
    T: Into<Task>,
{
    tasks.into_iter().map(Into::into).collect()
}

// ============================================================================
// SET
// ============================================================================

/// Assign workflow variables
#[derive(Debug, Clone)]
pub struct SetTask {
    common: TaskCommon,
    config: SetConfig,
}

impl SetTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: SetConfig::default(),
        }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.common.insert(&mut self.config.variables, key, value);
        self
    }

    pub fn vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoExpr,
    {
        for (key, value) in vars {
            self.common.insert(&mut self.config.variables, key, value);
        }
        self
    }
}

// ============================================================================
// HTTP CALL
// ============================================================================

#[derive(Debug, Clone)]
pub struct HttpCallTask {
    common: TaskCommon,
    config: HttpCallConfig,
}

impl HttpCallTask {
    pub fn new(name: impl Into<String>, method: HttpMethod, uri: impl IntoExpr) -> Self {
        let mut common = TaskCommon::new(name);
        let uri = common.expr(uri);
        Self {
            common,
            config: HttpCallConfig {
                method,
                uri,
                headers: ExprMap::new(),
                body: None,
                body_fields: ExprMap::new(),
                timeout_seconds: 0,
            },
        }
    }

    pub fn get(name: impl Into<String>, uri: impl IntoExpr) -> Self {
        Self::new(name, HttpMethod::Get, uri)
    }

    pub fn post(name: impl Into<String>, uri: impl IntoExpr) -> Self {
        Self::new(name, HttpMethod::Post, uri)
    }

    pub fn put(name: impl Into<String>, uri: impl IntoExpr) -> Self {
        Self::new(name, HttpMethod::Put, uri)
    }

    pub fn patch(name: impl Into<String>, uri: impl IntoExpr) -> Self {
        Self::new(name, HttpMethod::Patch, uri)
    }

    pub fn delete(name: impl Into<String>, uri: impl IntoExpr) -> Self {
        Self::new(name, HttpMethod::Delete, uri)
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.config.method = method;
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.common.insert(&mut self.config.headers, key, value);
        self
    }

    /// Whole request body (JSON values keep their structure)
    pub fn body(mut self, body: impl IntoExpr) -> Self {
        self.config.body = Some(self.common.expr(body));
        self
    }

    pub fn body_field(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.common.insert(&mut self.config.body_fields, key, value);
        self
    }

    pub fn timeout(mut self, seconds: u32) -> Self {
        self.config.timeout_seconds = seconds;
        self
    }
}

// ============================================================================
// GRPC CALL
// ============================================================================

#[derive(Debug, Clone)]
pub struct GrpcCallTask {
    common: TaskCommon,
    config: GrpcCallConfig,
}

impl GrpcCallTask {
    pub fn new(
        name: impl Into<String>,
        service: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: GrpcCallConfig {
                service: service.into(),
                method: method.into(),
                body: ExprMap::new(),
            },
        }
    }

    pub fn body_field(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.common.insert(&mut self.config.body, key, value);
        self
    }
}

// ============================================================================
// SWITCH
// ============================================================================

#[derive(Debug, Clone)]
pub struct SwitchTask {
    common: TaskCommon,
    config: SwitchConfig,
}

impl SwitchTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: SwitchConfig::default(),
        }
    }

    /// Route to `target` when `condition` holds; cases are tried in order
    pub fn case(mut self, condition: impl IntoExpr, target: impl TaskTarget) -> Self {
        let condition = self.common.expr(condition);
        self.config.cases.push(SwitchCase {
            condition,
            then: target.target_name(),
        });
        self
    }

    pub fn default(mut self, target: impl TaskTarget) -> Self {
        self.config.default_task = Some(target.target_name());
        self
    }
}

// ============================================================================
// FOR
// ============================================================================

/// Loop variable handed to FOR body closures
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopVar {
    name: String,
}

impl LoopVar {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// The current element: `${ .item }`
    pub fn item(&self) -> Term {
        field(&self.name)
    }

    /// A field of the current element: `${ .item.<path> }`
    pub fn field(&self, path: &str) -> Term {
        field(&self.name).access(path)
    }
}

#[derive(Debug, Clone)]
pub struct ForTask {
    common: TaskCommon,
    config: ForConfig,
}

impl ForTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: ForConfig {
                each: DEFAULT_LOOP_VAR.to_string(),
                over: None,
                tasks: Vec::new(),
            },
        }
    }

    /// Collection to iterate
    pub fn over(mut self, collection: impl IntoExpr) -> Self {
        self.config.over = Some(self.common.expr(collection));
        self
    }

    /// Rename the loop variable (default `item`)
    pub fn each(mut self, var: impl Into<String>) -> Self {
        self.config.each = var.into();
        self
    }

    pub fn task(mut self, task: impl Into<Task>) -> Self {
        self.config.tasks.push(task.into());
        self
    }

    /// Build the loop body with access to the loop variable
    pub fn body<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&LoopVar) -> Vec<Task>,
    {
        let var = LoopVar::new(self.config.each.clone());
        for task in build(&var) {
            self = self.task(task);
        }
        self
    }
}

// ============================================================================
// FORK
// ============================================================================

#[derive(Debug, Clone)]
pub struct ForkTask {
    common: TaskCommon,
    config: ForkConfig,
}

impl ForkTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: ForkConfig::default(),
        }
    }

    pub fn branch<I, T>(mut self, name: impl Into<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        self.config.branches.push(ForkBranch {
            name: name.into(),
            tasks: collect_tasks(tasks),
        });
        self
    }

    pub fn compete(mut self, compete: bool) -> Self {
        self.config.compete = compete;
        self
    }
}

// ============================================================================
// TRY
// ============================================================================

#[derive(Debug, Clone)]
pub struct TryTask {
    common: TaskCommon,
    config: TryConfig,
}

impl TryTask {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: TryConfig::default(),
        }
    }

    pub fn task(mut self, task: impl Into<Task>) -> Self {
        self.config.tasks.push(task.into());
        self
    }

    pub fn tasks<I, T>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        for task in tasks {
            self = self.task(task);
        }
        self
    }

    /// Handler run with the caught error bound to `as_var`
    pub fn catch<I, T>(mut self, as_var: impl Into<String>, tasks: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Task>,
    {
        let tasks = collect_tasks(tasks);
        let errors = self
            .config
            .catch
            .take()
            .map(|c| c.errors)
            .unwrap_or_default();
        self.config.catch = Some(CatchBlock {
            as_var: as_var.into(),
            errors,
            tasks,
        });
        self
    }

    /// Restrict the handler to these error types
    pub fn catch_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let errors: Vec<String> = errors.into_iter().map(Into::into).collect();
        match &mut self.config.catch {
            Some(block) => block.errors = errors,
            None => {
                self.config.catch = Some(CatchBlock {
                    as_var: "error".to_string(),
                    errors,
                    tasks: Vec::new(),
                })
            }
        }
        self
    }
}

// ============================================================================
// LISTEN / WAIT
// ============================================================================

#[derive(Debug, Clone)]
pub struct ListenTask {
    common: TaskCommon,
    config: ListenConfig,
}

impl ListenTask {
    pub fn new(name: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: ListenConfig {
                event: event.into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct WaitTask {
    common: TaskCommon,
    config: WaitConfig,
}

impl WaitTask {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: WaitConfig { duration },
        }
    }

    pub fn seconds(name: impl Into<String>, seconds: u64) -> Self {
        Self::new(name, Duration::seconds(seconds))
    }
}

// ============================================================================
// CALL ACTIVITY / RAISE / RUN
// ============================================================================

#[derive(Debug, Clone)]
pub struct CallActivityTask {
    common: TaskCommon,
    config: CallActivityConfig,
}

impl CallActivityTask {
    pub fn new(name: impl Into<String>, activity: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: CallActivityConfig {
                activity: activity.into(),
                input: ExprMap::new(),
            },
        }
    }

    pub fn input(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.common.insert(&mut self.config.input, key, value);
        self
    }
}

#[derive(Debug, Clone)]
pub struct RaiseTask {
    common: TaskCommon,
    config: RaiseConfig,
}

impl RaiseTask {
    pub fn new(name: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: RaiseConfig {
                error: error.into(),
                message: None,
                data: ExprMap::new(),
            },
        }
    }

    pub fn message(mut self, message: impl IntoExpr) -> Self {
        self.config.message = Some(self.common.expr(message));
        self
    }

    pub fn data(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.common.insert(&mut self.config.data, key, value);
        self
    }
}

/// Invoke another workflow
#[derive(Debug, Clone)]
pub struct RunTask {
    common: TaskCommon,
    config: RunConfig,
}

impl RunTask {
    pub fn new(name: impl Into<String>, workflow: impl Into<String>) -> Self {
        Self {
            common: TaskCommon::new(name),
            config: RunConfig {
                workflow: workflow.into(),
                input: ExprMap::new(),
            },
        }
    }

    pub fn input(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.common.insert(&mut self.config.input, key, value);
        self
    }
}

// ============================================================================
// AGENT CALL
// ============================================================================

#[derive(Debug, Clone)]
pub struct AgentCallTask {
    common: TaskCommon,
    config: AgentCallConfig,
}

impl AgentCallTask {
    pub fn new(
        name: impl Into<String>,
        agent: impl Into<AgentRef>,
        message: impl IntoExpr,
    ) -> Self {
        let mut common = TaskCommon::new(name);
        let message = common.expr(message);
        Self {
            common,
            config: AgentCallConfig {
                agent: agent.into(),
                message,
                env: ExprMap::new(),
                skills: Vec::new(),
                model: None,
                timeout_seconds: 0,
                temperature: None,
            },
        }
    }

    pub fn message(mut self, message: impl IntoExpr) -> Self {
        self.config.message = self.common.expr(message);
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl IntoExpr) -> Self {
        self.common.insert(&mut self.config.env, key, value);
        self
    }

    pub fn skill(mut self, skill: impl Into<SkillRef>) -> Self {
        self.config.skills.push(skill.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    /// Execution timeout in seconds (1..=3600)
    pub fn timeout(mut self, seconds: u32) -> Self {
        self.config.timeout_seconds = seconds;
        self
    }

    /// Sampling temperature (0.0..=1.0)
    pub fn temperature(mut self, temperature: f64) -> Self {
        self.config.temperature = Some(temperature);
        self
    }
}
