//! Daily sync demo
//!
//! Builds a small workflow (fetch, branch, loop, agent review), converts it
//! and prints the manifest as YAML.
//!
//! Run: RUST_LOG=taskgraph=debug cargo run --example daily_sync

use miette::Result;
use taskgraph::expr::error_message;
use taskgraph::{
    runtime_env, runtime_secret, Context, EnvironmentVariable, FieldRef, ForTask, RaiseTask,
    ResourceRef, SetTask, SwitchTask, TryTask, Workflow,
};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut ctx = Context::new();
    let api = ctx.set_string("api_base", "https://api.example.com/v2");
    ctx.set_int("page_size", 50);

    let token = EnvironmentVariable::builder("API_TOKEN")
        .secret()
        .description("Bearer token for the upstream API")
        .build()?;
    let region = EnvironmentVariable::builder("REGION")
        .default_value("eu-west-1")
        .build()?;

    let mut wf = Workflow::builder()
        .namespace("data-processing")
        .name("Daily Sync")
        .version("1.0.0")
        .description("Pull yesterday's records and hand anomalies to a reviewer")
        .env_vars([token, region])
        .build()?;

    let fetch = wf.http_get("fetch-records", api.append("/records"), |t| {
        t.header("Authorization", runtime_secret("API_TOKEN"))
            .header("X-Region", runtime_env("REGION"))
            .body_field("limit", "${page_size}")
            .timeout(60)
    });

    wf.add_task(
        SwitchTask::new("route")
            .case(fetch.field("count").greater_than(0), "process")
            .default("idle"),
    );

    wf.add_task(
        ForTask::new("process")
            .over(fetch.field("records"))
            .body(|record| {
                vec![TryTask::new("store-record")
                    .task(SetTask::new("normalize").var("id", record.field("id")))
                    .catch(
                        "err",
                        [RaiseTask::new("store-failed", "StoreError").message(error_message("err"))],
                    )
                    .build()]
            })
            .then("review"),
    );

    wf.call_agent(
        "review",
        ResourceRef::platform("data-quality-reviewer"),
        "Summarise anomalies in today's sync",
        |t| {
            t.env("DATASET", FieldRef::new("fetch-records", "dataset"))
                .model("claude-sonnet")
                .timeout(600)
                .end()
        },
    );
    wf.set("idle", |t| t.var("status", "nothing to sync").end());

    let manifest = wf.to_manifest_with_context(&ctx)?;
    println!("{}", manifest.to_yaml()?);

    for placeholder in manifest.runtime_refs() {
        tracing::info!(%placeholder, "runtime value required");
    }
    Ok(())
}
