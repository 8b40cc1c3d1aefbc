//! taskgraph - task-graph builder SDK with validated manifest synthesis
//!
//! Build workflows from typed task nodes, wire outputs between tasks with
//! field references, keep secrets as runtime placeholders, then convert the
//! graph into a schema-checked `agentic.stigmer.ai/v1` manifest.
//!
//! ```rust,ignore
//! use taskgraph::{runtime_secret, Workflow};
//!
//! let mut wf = Workflow::builder().namespace("acme").name("daily-sync").build()?;
//! let fetch = wf.http_get("fetch", "https://api.example.com/items", |t| {
//!     t.header("Authorization", runtime_secret("API_TOKEN"))
//! });
//! wf.set("store", |t| t.var("count", fetch.field("total")));
//! println!("{}", wf.to_manifest()?.to_yaml()?);
//! ```

pub mod builders;
pub mod context;
pub mod convert;
pub mod environment;
pub mod error;
pub mod expr;
pub mod flow_graph;
pub mod manifest;
pub mod naming;
pub mod schema;
pub mod task;
pub mod template;
pub mod validator;
pub mod workflow;

pub use builders::WorkflowBuilder;
pub use context::{BoolRef, Context, IntRef, ObjectRef, StringRef};
pub use convert::{synthesize, Converter};
pub use environment::EnvironmentVariable;
pub use error::{ErrorKind, Result, Rule, TaskGraphError};
pub use expr::{interpolate, runtime_env, runtime_secret, Expr, IntoExpr, Term};
pub use flow_graph::FlowGraph;
pub use manifest::{ManifestBundle, WorkflowManifest};
pub use task::builders::{
    AgentCallTask, CallActivityTask, ForTask, ForkTask, GrpcCallTask, HttpCallTask, ListenTask,
    RaiseTask, RunTask, SetTask, SwitchTask, TryTask, WaitTask,
};
pub use task::config::{Duration, HttpMethod, ResourceRef, ResourceScope};
pub use task::{FieldRef, Task, TaskKind};
pub use workflow::{TaskHandle, Workflow};
