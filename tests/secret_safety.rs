//! Secret-safety regression tests
//!
//! Runtime placeholders must reach the manifest exactly as written. Nothing in
//! the conversion path may substitute, reformat or drop them.

use pretty_assertions::assert_eq;
use serde_json::json;
use taskgraph::expr::resolve;
use taskgraph::{
    interpolate, runtime_env, runtime_secret, AgentCallTask, Context, EnvironmentVariable,
    ErrorKind, GrpcCallTask, HttpCallTask, IntoExpr, RaiseTask, RunTask, SetTask, Workflow,
};

fn workflow() -> taskgraph::WorkflowBuilder {
    Workflow::builder().namespace("security").name("secrets")
}

// ============================================================================
// PLACEHOLDERS PASS THROUGH
// ============================================================================

#[test]
fn test_secret_placeholder_is_never_resolved() {
    let secret = runtime_secret("OPENAI_KEY");
    assert!(secret.clone().into_expr().is_deferred());
    assert_eq!(resolve(&secret), "${.secrets.OPENAI_KEY}");
}

#[test]
fn test_placeholders_in_every_payload_field() {
    let wf = workflow()
        .task(
            HttpCallTask::post("call", runtime_env("BASE_URL"))
                .header("X-Api-Key", runtime_secret("API_KEY"))
                .body_field("token", runtime_secret("BODY_TOKEN")),
        )
        .task(GrpcCallTask::new("rpc", "billing.Invoices", "Create").body_field("key", runtime_secret("GRPC_KEY")))
        .task(RunTask::new("child", "child-flow").input("password", runtime_secret("DB_PASSWORD")))
        .task(RaiseTask::new("fail", "Unauthorized").data("hint", runtime_env("REGION")))
        .build()
        .unwrap();

    let manifest = wf.to_manifest().unwrap();
    let call = &manifest.task("call").unwrap().task_config;
    assert_eq!(call["endpoint"]["uri"], json!("${.env_vars.BASE_URL}"));
    assert_eq!(call["headers"]["X-Api-Key"], json!("${.secrets.API_KEY}"));
    assert_eq!(call["body"]["token"], json!("${.secrets.BODY_TOKEN}"));
    assert_eq!(
        manifest.task("rpc").unwrap().task_config["body"]["key"],
        json!("${.secrets.GRPC_KEY}")
    );
    assert_eq!(
        manifest.task("child").unwrap().task_config["input"]["password"],
        json!("${.secrets.DB_PASSWORD}")
    );
    assert_eq!(
        manifest.task("fail").unwrap().task_config["data"]["hint"],
        json!("${.env_vars.REGION}")
    );

    let mut refs = manifest.runtime_refs();
    refs.sort();
    assert_eq!(
        refs,
        vec![
            "${.env_vars.BASE_URL}".to_string(),
            "${.env_vars.REGION}".to_string(),
            "${.secrets.API_KEY}".to_string(),
            "${.secrets.BODY_TOKEN}".to_string(),
            "${.secrets.DB_PASSWORD}".to_string(),
            "${.secrets.GRPC_KEY}".to_string(),
        ]
    );
}

#[test]
fn test_agent_env_keeps_placeholders() {
    let wf = workflow()
        .task(
            AgentCallTask::new("review", "code-reviewer", "Review the diff")
                .env("GITHUB_TOKEN", runtime_secret("GITHUB_TOKEN")),
        )
        .build()
        .unwrap();
    let manifest = wf.to_manifest().unwrap();
    assert_eq!(
        manifest.spec.tasks[0].task_config["env"]["GITHUB_TOKEN"],
        json!("${.secrets.GITHUB_TOKEN}")
    );
}

#[test]
fn test_interpolated_secret_stays_an_expression() {
    let header = interpolate(["Bearer ".into_expr(), runtime_secret("TOKEN").into_expr()]);
    assert!(header.is_deferred());
    assert_eq!(header.render(), r#"${ "Bearer " + .secrets.TOKEN }"#);
}

#[test]
fn test_runtime_refs_lists_whole_placeholders_only() {
    let bearer = interpolate(["Bearer ".into_expr(), runtime_secret("TOKEN").into_expr()]);
    let wf = workflow()
        .task(
            HttpCallTask::get("fetch", "https://api.example.com")
                .header("Authorization", bearer)
                .header("X-Api-Key", runtime_secret("API_KEY")),
        )
        .build()
        .unwrap();

    let manifest = wf.to_manifest().unwrap();
    assert_eq!(
        manifest.task("fetch").unwrap().task_config["headers"]["Authorization"],
        json!(r#"${ "Bearer " + .secrets.TOKEN }"#)
    );
    assert_eq!(manifest.runtime_refs(), vec!["${.secrets.API_KEY}".to_string()]);
}

// ============================================================================
// CONTEXT INTERPOLATION
// ============================================================================

#[test]
fn test_context_never_touches_runtime_placeholders() {
    let mut ctx = Context::new();
    ctx.set_string("region", "eu-west-1");
    // a context value that happens to share a secret's name
    ctx.set_string("TOKEN", "leaked-value");

    let wf = workflow()
        .task(
            HttpCallTask::get("fetch", "https://${region}.example.com")
                .header("Authorization", "Bearer ${.secrets.TOKEN}"),
        )
        .build()
        .unwrap();

    let manifest = wf.to_manifest_with_context(&ctx).unwrap();
    let config = &manifest.spec.tasks[0].task_config;
    assert_eq!(config["endpoint"]["uri"], json!("https://eu-west-1.example.com"));
    assert_eq!(config["headers"]["Authorization"], json!("Bearer ${.secrets.TOKEN}"));
    assert!(!manifest.to_json_pretty().unwrap().contains("leaked-value"));
}

#[test]
fn test_known_context_values_are_literal() {
    let mut ctx = Context::new();
    let retries = ctx.set_int("retries", 3);
    let wf = workflow()
        .task(SetTask::new("init").var("retries", &retries))
        .build()
        .unwrap();
    let manifest = wf.to_manifest().unwrap();
    assert_eq!(manifest.spec.tasks[0].task_config["variables"]["retries"], json!("3"));
}

// ============================================================================
// DECLARATIONS AND MALFORMED PLACEHOLDERS
// ============================================================================

#[test]
fn test_secret_declaration_carries_no_value() {
    let key = EnvironmentVariable::builder("API_KEY")
        .secret()
        .description("Upstream API key")
        .build()
        .unwrap();
    let wf = workflow()
        .task(HttpCallTask::get("fetch", "https://api.example.com").header("X-Key", &key))
        .env_var(key)
        .build()
        .unwrap();

    let manifest = wf.to_manifest().unwrap();
    let env = &manifest.spec.env_spec.as_ref().unwrap().data["API_KEY"];
    assert!(env.is_secret);
    assert_eq!(env.value, None);
    assert_eq!(
        manifest.spec.tasks[0].task_config["headers"]["X-Key"],
        json!("${.secrets.API_KEY}")
    );
}

#[test]
fn test_lowercase_secret_placeholder_rejected() {
    let wf = workflow()
        .task(HttpCallTask::get("fetch", "https://api.example.com").header("X-Key", "${.secrets.api_key}"))
        .build()
        .unwrap();
    let err = wf.to_manifest().unwrap_err();
    assert!(err.is(ErrorKind::InvalidRuntimeReference));
}
