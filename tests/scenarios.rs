//! End-to-end workflow scenarios
//!
//! Each test builds a workflow through the public API, converts it and checks
//! the produced manifest.

use pretty_assertions::assert_eq;
use serde_json::json;
use taskgraph::error::Rule;
use taskgraph::{
    runtime_secret, ErrorKind, HttpCallTask, SetTask, TaskKind, Workflow, WorkflowManifest,
};

// ============================================================================
// METADATA
// ============================================================================

#[test]
fn test_single_set_task_converts() {
    let wf = Workflow::builder()
        .namespace("data-processing")
        .name("daily-sync")
        .version("1.0.0")
        .task(SetTask::new("init").var("status", "ok"))
        .build()
        .unwrap();

    let manifest = wf.to_manifest().unwrap();
    assert_eq!(manifest.metadata.name, "daily-sync");
    assert_eq!(manifest.spec.document.version, "1.0.0");
    assert_eq!(manifest.spec.tasks.len(), 1);
    assert_eq!(manifest.spec.tasks[0].kind, TaskKind::Set);
    assert_eq!(
        manifest.spec.tasks[0].task_config,
        json!({"variables": {"status": "ok"}})
    );
}

#[test]
fn test_empty_version_defaults() {
    let wf = Workflow::builder()
        .namespace("data-processing")
        .name("daily-sync")
        .version("")
        .build()
        .unwrap();
    assert_eq!(wf.version(), "0.1.0");
}

// ============================================================================
// DEPENDENCIES
// ============================================================================

#[test]
fn test_field_reference_creates_dependency() {
    let fetch = HttpCallTask::get("fetch", "https://api.example.com/item").build();
    let process = SetTask::new("process").var("title", fetch.field("title")).build();
    assert_eq!(process.dependencies().to_vec(), vec!["fetch".to_string()]);

    let wf = Workflow::builder()
        .namespace("data-processing")
        .name("daily-sync")
        .task(fetch)
        .task(process)
        .build()
        .unwrap();

    let fetch = wf.task("fetch").unwrap();
    assert!(fetch.export_directive().is_some_and(|e| !e.is_empty()));

    let manifest = wf.to_manifest().unwrap();
    assert_eq!(
        manifest.task("process").unwrap().task_config["variables"]["title"],
        json!(r#"${ $context["fetch"].title }"#)
    );
    assert_eq!(
        manifest.task("fetch").unwrap().export.as_ref().map(|e| e.directive.as_str()),
        Some("${.}")
    );
}

#[test]
fn test_hyphenated_task_names_use_brackets() {
    let mut wf = Workflow::builder()
        .namespace("code-review")
        .name("review-pr")
        .build()
        .unwrap();
    let fetch = wf.http_get("fetch-pr", "https://api.github.com/pulls/1", |t| t);
    wf.set("analyze-pr", |t| t.var("url", fetch.field("url")));

    assert_eq!(
        fetch.field("url").expression(),
        r#"${ $context["fetch-pr"].url }"#
    );

    let manifest = wf.to_manifest().unwrap();
    let url = manifest.task("analyze-pr").unwrap().task_config["variables"]["url"].clone();
    assert_eq!(url, json!(r#"${ $context["fetch-pr"].url }"#));
    assert!(!url.as_str().unwrap_or_default().contains(".fetch-pr"));
}

// ============================================================================
// ERRORS
// ============================================================================

#[test]
fn test_duplicate_names_report_index() {
    let err = Workflow::builder()
        .namespace("data-processing")
        .name("daily-sync")
        .task(SetTask::new("init").var("a", 1))
        .task(SetTask::new("init").var("b", 2))
        .build()
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::DuplicateTaskName);
    let validation = err.validation().unwrap();
    assert_eq!(validation.field, "tasks[1].name");
    assert_eq!(validation.rule, Rule::Unique);
    assert_eq!(validation.value, "init");
}

#[test]
fn test_unknown_then_target_rejected_at_conversion() {
    let wf = Workflow::builder()
        .namespace("data-processing")
        .name("daily-sync")
        .task(SetTask::new("init").var("a", 1).then("missing"))
        .build()
        .unwrap();

    let err = wf.to_manifest().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTaskReference);
    assert_eq!(err.validation().map(|v| v.rule), Some(Rule::Exists));
}

// ============================================================================
// SECRETS
// ============================================================================

#[test]
fn test_secret_header_passes_through() {
    let wf = Workflow::builder()
        .namespace("ai")
        .name("summarize")
        .task(
            HttpCallTask::post("complete", "https://api.openai.com/v1/chat/completions")
                .header("Authorization", runtime_secret("OPENAI_KEY")),
        )
        .build()
        .unwrap();

    let manifest = wf.to_manifest().unwrap();
    assert_eq!(
        manifest.spec.tasks[0].task_config["headers"]["Authorization"],
        json!("${.secrets.OPENAI_KEY}")
    );
    assert_eq!(manifest.runtime_refs(), vec!["${.secrets.OPENAI_KEY}".to_string()]);
}

// ============================================================================
// OUTPUT
// ============================================================================

#[test]
fn test_yaml_output_parses_back() {
    let wf = Workflow::builder()
        .namespace("data-processing")
        .name("daily-sync")
        .task(SetTask::new("init").var("status", "ok").end())
        .build()
        .unwrap();

    let manifest = wf.to_manifest().unwrap();
    let yaml = manifest.to_yaml().unwrap();
    assert!(yaml.contains("kind: Workflow"));
    assert!(yaml.contains("taskConfig:"));
    assert_eq!(WorkflowManifest::from_yaml(&yaml).unwrap(), manifest);
}
