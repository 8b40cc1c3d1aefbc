//! Config-to-wire conversion per task kind, plus the schema phase

use pretty_assertions::assert_eq;
use serde_json::json;
use taskgraph::error::Rule;
use taskgraph::schema::{SchemaErrorKind, SchemaValidator};
use taskgraph::task::config::Duration;
use taskgraph::{
    synthesize, AgentCallTask, CallActivityTask, Converter, ErrorKind, FieldRef, ForTask,
    ForkTask, HttpCallTask, ListenTask, RaiseTask, ResourceRef, RunTask, SetTask, SwitchTask,
    TaskKind, TryTask, WaitTask, Workflow,
};

fn workflow() -> taskgraph::WorkflowBuilder {
    Workflow::builder().namespace("acme").name("orders")
}

fn config_of(wf: &Workflow, task: &str) -> serde_json::Value {
    let manifest = wf.to_manifest().unwrap();
    manifest.task(task).unwrap().task_config.clone()
}

// ============================================================================
// CONTROL FLOW KINDS
// ============================================================================

#[test]
fn test_switch_cases_and_default() {
    let check = FieldRef::new("check", "status");
    let wf = workflow()
        .task(HttpCallTask::get("check", "https://api.example.com/status"))
        .task(
            SwitchTask::new("route")
                .case(check.equals("ready"), "ship")
                .case(check.equals("blocked"), "notify")
                .default("wait"),
        )
        .task(SetTask::new("ship").var("shipped", true).end())
        .task(SetTask::new("notify").var("notified", true).end())
        .task(WaitTask::new("wait", Duration::minutes(5)).end())
        .build()
        .unwrap();

    assert_eq!(
        config_of(&wf, "route"),
        json!({
            "cases": [
                {"name": "case1", "when": r#"${ $context["check"].status == "ready" }"#, "then": "ship"},
                {"name": "case2", "when": r#"${ $context["check"].status == "blocked" }"#, "then": "notify"},
                {"name": "default", "when": "", "then": "wait"},
            ]
        })
    );
    assert_eq!(config_of(&wf, "wait"), json!({"duration": "5m"}));
}

#[test]
fn test_fork_branches() {
    let wf = workflow()
        .task(
            ForkTask::new("fan-out")
                .branch("email", [SetTask::new("send-email").var("channel", "email")])
                .branch("sms", [SetTask::new("send-sms").var("channel", "sms")])
                .compete(true),
        )
        .build()
        .unwrap();

    let config = config_of(&wf, "fan-out");
    assert_eq!(config["compete"], json!(true));
    assert_eq!(config["branches"][0]["name"], json!("email"));
    assert_eq!(config["branches"][1]["do"][0]["name"], json!("send-sms"));
    assert_eq!(config["branches"][1]["do"][0]["kind"], json!("SET"));
}

#[test]
fn test_fork_without_compete_omits_flag() {
    let wf = workflow()
        .task(ForkTask::new("fan-out").branch("only", [SetTask::new("one").var("x", 1)]))
        .build()
        .unwrap();
    assert!(config_of(&wf, "fan-out").get("compete").is_none());
}

#[test]
fn test_try_catch() {
    let wf = workflow()
        .task(
            TryTask::new("guarded")
                .task(HttpCallTask::post("charge", "https://pay.example.com/charge"))
                .catch("err", [RaiseTask::new("fail", "PaymentFailed").message(taskgraph::expr::error_message("err"))])
                .catch_errors(["Timeout", "Unavailable"]),
        )
        .build()
        .unwrap();

    let config = config_of(&wf, "guarded");
    assert_eq!(config["try"][0]["task_config"]["method"], json!("POST"));
    assert_eq!(config["catch"]["as"], json!("err"));
    assert_eq!(config["catch"]["errors"], json!(["Timeout", "Unavailable"]));
    assert_eq!(
        config["catch"]["do"][0]["task_config"],
        json!({"error": "PaymentFailed", "message": "${ .err.message }"})
    );
}

#[test]
fn test_for_loop_with_item_fields() {
    let wf = workflow()
        .task(HttpCallTask::get("list", "https://api.example.com/orders"))
        .task(
            ForTask::new("each-order")
                .each("order")
                .over(FieldRef::new("list", "orders"))
                .body(|order| {
                    vec![HttpCallTask::post("ship-order", "https://api.example.com/ship")
                        .body_field("id", order.field("id"))
                        .build()]
                }),
        )
        .build()
        .unwrap();

    let config = config_of(&wf, "each-order");
    assert_eq!(config["each"], json!("order"));
    assert_eq!(config["in"], json!(r#"${ $context["list"].orders }"#));
    assert_eq!(
        config["do"][0]["task_config"]["body"]["id"],
        json!("${ .order.id }")
    );
    assert_eq!(wf.task("each-order").unwrap().dependencies().to_vec(), vec!["list".to_string()]);
}

// ============================================================================
// CALL KINDS
// ============================================================================

#[test]
fn test_agent_call_payload() {
    let wf = workflow()
        .task(
            AgentCallTask::new("review", ResourceRef::platform("code-reviewer"), "Review PR")
                .model("claude-sonnet")
                .timeout(600)
                .temperature(0.2)
                .skill(ResourceRef::organization("style-guide")),
        )
        .build()
        .unwrap();

    assert_eq!(
        config_of(&wf, "review"),
        json!({
            "agent": "code-reviewer",
            "scope": "platform",
            "message": "Review PR",
            "config": {"model": "claude-sonnet", "timeout": 600, "temperature": 0.2},
            "skills": [{"slug": "style-guide", "scope": "organization"}],
        })
    );
}

#[test]
fn test_misc_kinds() {
    let wf = workflow()
        .task(ListenTask::new("await-approval", "order.approved"))
        .task(CallActivityTask::new("bill", "billing.charge").input("amount", 42))
        .task(RunTask::new("child", "fulfilment").input("priority", "high"))
        .build()
        .unwrap();

    assert_eq!(config_of(&wf, "await-approval"), json!({"event": "order.approved"}));
    assert_eq!(
        config_of(&wf, "bill"),
        json!({"activity": "billing.charge", "input": {"amount": 42}})
    );
    assert_eq!(
        config_of(&wf, "child"),
        json!({"workflow": "fulfilment", "input": {"priority": "high"}})
    );
}

#[test]
fn test_http_timeout_and_raw_body() {
    let wf = workflow()
        .task(
            HttpCallTask::put("update", "https://api.example.com/orders/1")
                .body(json!({"status": "shipped", "items": [1, 2]}))
                .timeout(30),
        )
        .build()
        .unwrap();
    assert_eq!(
        config_of(&wf, "update"),
        json!({
            "method": "PUT",
            "endpoint": {"uri": "https://api.example.com/orders/1"},
            "body": {"status": "shipped", "items": [1, 2]},
            "timeout_seconds": 30,
        })
    );
}

// ============================================================================
// SCHEMA PHASE
// ============================================================================

#[test]
fn test_out_of_range_timeout_names_task() {
    let wf = workflow()
        .task(HttpCallTask::get("slow", "https://api.example.com").timeout(900))
        .build()
        .unwrap();

    let err = wf.to_manifest().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conversion);
    assert!(err.is(ErrorKind::InvalidTaskConfig));
    let schema = err.schema_error().unwrap();
    assert_eq!(schema.path, "/timeout_seconds");
    assert_eq!(schema.kind, SchemaErrorKind::OutOfRange);
    assert!(err.to_string().contains("tasks[0]"));
}

#[test]
fn test_agent_temperature_out_of_range() {
    let wf = workflow()
        .task(AgentCallTask::new("review", "reviewer", "go").temperature(1.5))
        .build()
        .unwrap();
    let err = wf.to_manifest().unwrap_err();
    assert_eq!(err.schema_error().map(|e| e.path.as_str()), Some("/config/temperature"));
}

#[test]
fn test_agent_temperature_non_finite_rejected() {
    for temperature in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
        let wf = workflow()
            .task(AgentCallTask::new("review", "reviewer", "go").temperature(temperature))
            .build()
            .unwrap();
        let err = wf.to_manifest().unwrap_err();
        assert!(err.is(ErrorKind::InvalidTaskConfig));
        assert!(err.to_string().contains("tasks[0]"));
        let validation = err.validation().unwrap();
        assert_eq!(validation.field, "config.temperature");
        assert_eq!(validation.rule, Rule::Format);
    }
}

#[test]
fn test_empty_fork_fails_schema() {
    let wf = workflow().task(ForkTask::new("nothing")).build().unwrap();
    let err = wf.to_manifest().unwrap_err();
    assert!(err.schema_error().is_some());
}

#[test]
fn test_explicit_validator_instance() {
    let validator = SchemaValidator::new().unwrap();
    let wf = workflow().task(WaitTask::seconds("pause", 1)).build().unwrap();
    let manifest = Converter::with_validator(&validator).convert(&wf).unwrap();
    assert_eq!(manifest.spec.tasks[0].kind, TaskKind::Wait);
}

// ============================================================================
// GRAPH CLOSURE
// ============================================================================

#[test]
fn test_dependency_cycle_rejected() {
    let wf = workflow()
        .task(SetTask::new("a").var("x", 1).depends_on("b"))
        .task(SetTask::new("b").var("y", 2).depends_on("a"))
        .build()
        .unwrap();

    let err = wf.to_manifest().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DependencyCycle);
    let validation = err.validation().unwrap();
    assert_eq!(validation.rule, Rule::Acyclic);
    assert!(validation.message.contains("a -> b -> a"));
}

#[test]
fn test_then_loops_are_allowed() {
    let wf = workflow()
        .task(SetTask::new("poll").var("tick", 1).then("check"))
        .task(SwitchTask::new("check").case("${ .done }", "finish").default("poll"))
        .task(SetTask::new("finish").var("ok", true).end())
        .build()
        .unwrap();
    assert!(wf.to_manifest().is_ok());
}

#[test]
fn test_unknown_dependency_rejected() {
    let wf = workflow()
        .task(SetTask::new("a").var("x", FieldRef::new("ghost", "value")))
        .build()
        .unwrap();
    let err = wf.to_manifest().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnknownTaskReference);
    assert_eq!(err.validation().map(|v| v.field.as_str()), Some("tasks[0].depends_on"));
}

// ============================================================================
// BUNDLE
// ============================================================================

#[test]
fn test_bundle_serializes_both_workflows() {
    let orders = workflow().task(WaitTask::seconds("w", 1)).build().unwrap();
    let billing = Workflow::builder()
        .namespace("acme")
        .name("Billing Run")
        .task(WaitTask::seconds("w", 1))
        .build()
        .unwrap();

    let bundle = synthesize(&[&orders, &billing], None).unwrap();
    let json = bundle.to_json_pretty().unwrap();
    assert!(json.contains("\"sdkMetadata\""));
    assert_eq!(bundle.workflows[1].metadata.slug, "billing-run");
}
