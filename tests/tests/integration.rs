//! End-to-end coverage of feasibility, sequential/parallel aggregation,
//! failure cascades, and retry-abort scenarios, driving a real `Planner`
//! over `taskweave_runtime::testkit` doubles.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use taskweave_kernel::{FeasibilityResult, RawNode, RawTree, RequestStatus};
use taskweave_runtime::testkit::{EchoCapability, FailingCapability, ScriptedLlmClient, SlowCapability, UppercaseCapability};
use taskweave_runtime::{InMemoryCapabilityRegistry, ShutdownCoordinator, ShutdownHook, ShutdownOutcome};
use taskweave_tests::planner_with_scripted_router;

fn echo_node(message: &str) -> RawNode {
    let mut args = HashMap::new();
    args.insert("message".to_string(), serde_json::json!(message));
    RawNode {
        layer_name: "echo-layer".into(),
        function: "echo".into(),
        args,
        parallel: false,
        children: vec![],
    }
}

fn feasible() -> FeasibilityResult {
    FeasibilityResult { feasible: true, reason: "capability available".into(), suggestion: None }
}

#[tokio::test]
async fn single_node_request_completes_on_first_attempt() {
    let registry = Arc::new(InMemoryCapabilityRegistry::with_defaults());
    registry.register(Box::new(EchoCapability)).unwrap();

    let client = Arc::new(ScriptedLlmClient::new("scripted", "test-model"));
    client.push_feasibility(Ok(feasible()));
    client.push_tree(Ok(RawTree { root_nodes: vec![echo_node("hello")] }));
    client.push_evaluation(Ok(taskweave_kernel::EvaluationResult {
        is_satisfactory: true,
        reason: "matches the request".into(),
        needs_retry: false,
    }));

    let planner = planner_with_scripted_router(registry, client, 5);
    let history = planner.run("echo hello").await;

    assert_eq!(history.status, RequestStatus::Completed);
    assert_eq!(history.result.text.as_deref(), Some("hello"));
}

#[tokio::test]
async fn sequential_chain_passes_output_as_the_next_nodes_argument() {
    let registry = Arc::new(InMemoryCapabilityRegistry::with_defaults());
    registry.register(Box::new(EchoCapability)).unwrap();
    registry.register(Box::new(UppercaseCapability)).unwrap();

    let shout = RawNode {
        layer_name: "uppercase-layer".into(),
        function: "shout".into(),
        args: HashMap::new(),
        parallel: false,
        children: vec![],
    };
    let root = RawNode { children: vec![shout], ..echo_node("hi") };

    let client = Arc::new(ScriptedLlmClient::new("scripted", "test-model"));
    client.push_feasibility(Ok(feasible()));
    client.push_tree(Ok(RawTree { root_nodes: vec![root] }));
    let mut extracted = HashMap::new();
    extracted.insert("text".to_string(), serde_json::json!("hi"));
    client.push_parameters(Ok(extracted));
    client.push_evaluation(Ok(taskweave_kernel::EvaluationResult {
        is_satisfactory: true,
        reason: "ok".into(),
        needs_retry: false,
    }));

    let planner = planner_with_scripted_router(registry, client, 5);
    let history = planner.run("shout hi").await;

    assert_eq!(history.status, RequestStatus::Completed);
    assert_eq!(history.result.text.as_deref(), Some("HI"));
}

#[tokio::test]
async fn parallel_siblings_aggregate_as_a_newline_joined_multiset() {
    let registry = Arc::new(InMemoryCapabilityRegistry::with_defaults());
    registry.register(Box::new(EchoCapability)).unwrap();

    let root = RawNode {
        children: vec![echo_node("A"), echo_node("B"), echo_node("C")],
        parallel: true,
        ..echo_node("root")
    };

    let client = Arc::new(ScriptedLlmClient::new("scripted", "test-model"));
    client.push_feasibility(Ok(feasible()));
    client.push_tree(Ok(RawTree { root_nodes: vec![root] }));
    client.push_evaluation(Ok(taskweave_kernel::EvaluationResult {
        is_satisfactory: true,
        reason: "ok".into(),
        needs_retry: false,
    }));

    let planner = planner_with_scripted_router(registry, client, 5);
    let history = planner.run("fan out").await;

    assert_eq!(history.status, RequestStatus::Completed);
    let mut lines: Vec<&str> = history.result.text.as_deref().unwrap().lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn infeasible_request_fails_without_creating_a_tree() {
    let registry = Arc::new(InMemoryCapabilityRegistry::with_defaults());

    let client = Arc::new(ScriptedLlmClient::new("scripted", "test-model"));
    client.push_feasibility(Ok(FeasibilityResult {
        feasible: false,
        reason: "no capability can book a flight".into(),
        suggestion: Some("connect a travel-booking capability".into()),
    }));

    let planner = planner_with_scripted_router(registry, client, 5);
    let history = planner.run("book me a flight").await;

    assert_eq!(history.status, RequestStatus::Failed);
    let error = history.result.error.unwrap();
    assert!(error.contains("no capability can book a flight"));
    assert!(error.contains("connect a travel-booking capability"));
}

#[tokio::test]
async fn failing_node_skips_its_descendants_but_the_request_can_still_retry() {
    let registry = Arc::new(InMemoryCapabilityRegistry::with_defaults());
    registry.register(Box::new(FailingCapability { message: "boom".into() })).unwrap();
    registry.register(Box::new(EchoCapability)).unwrap();

    let failing_root = RawNode {
        layer_name: "failing-layer".into(),
        function: "fail".into(),
        args: HashMap::new(),
        parallel: false,
        children: vec![echo_node("unreachable")],
    };

    let client = Arc::new(ScriptedLlmClient::new("scripted", "test-model"));
    client.push_feasibility(Ok(feasible()));
    client.push_tree(Ok(RawTree { root_nodes: vec![failing_root] }));
    // first attempt's evaluation: treated as a failure needing retry
    client.push_evaluation(Ok(taskweave_kernel::EvaluationResult {
        is_satisfactory: false,
        reason: "the failing-layer call errored".into(),
        needs_retry: true,
    }));
    client.push_retry(Ok(taskweave_kernel::RetryStrategyResult {
        should_stop: true,
        reason: "no alternative capability exists".into(),
        new_tree: None,
    }));

    let planner = planner_with_scripted_router(registry, client, 5);
    let history = planner.run("do the thing").await;

    assert_eq!(history.status, RequestStatus::Failed);
    assert!(history.result.error.unwrap().contains("no alternative capability exists"));
}

#[tokio::test]
async fn identical_consecutive_attempts_abort_instead_of_burning_the_retry_budget() {
    let registry = Arc::new(InMemoryCapabilityRegistry::with_defaults());
    registry.register(Box::new(EchoCapability)).unwrap();

    let client = Arc::new(ScriptedLlmClient::new("scripted", "test-model"));
    client.push_feasibility(Ok(feasible()));
    client.push_tree(Ok(RawTree { root_nodes: vec![echo_node("hello")] }));
    client.push_evaluation(Ok(taskweave_kernel::EvaluationResult {
        is_satisfactory: false,
        reason: "still wrong".into(),
        needs_retry: true,
    }));
    client.push_retry(Ok(taskweave_kernel::RetryStrategyResult {
        should_stop: false,
        reason: "try the same plan again".into(),
        new_tree: Some(RawTree { root_nodes: vec![echo_node("hello")] }),
    }));
    client.push_evaluation(Ok(taskweave_kernel::EvaluationResult {
        is_satisfactory: false,
        reason: "still wrong".into(),
        needs_retry: true,
    }));
    client.push_comparison(Ok(taskweave_kernel::ComparisonResult {
        is_significantly_different: false,
        reason: "second attempt produced the same tree and the same output".into(),
    }));

    // Five attempts are budgeted, but the second attempt is indistinguishable
    // from the first, so the planner must abort on attempt 2 rather than
    // spend the remaining three.
    let planner = planner_with_scripted_router(registry, client, 5);
    let history = planner.run("echo hello").await;

    assert_eq!(history.status, RequestStatus::Failed);
    assert!(history.result.error.unwrap().contains("no significant progress"));
    assert!(history.logs.iter().any(|l| l.contains("aborting: no significant progress between attempts")));
}

#[tokio::test]
async fn retry_strategy_unavailable_aborts_immediately_regardless_of_remaining_budget() {
    let registry = Arc::new(InMemoryCapabilityRegistry::with_defaults());
    registry.register(Box::new(FailingCapability { message: "boom".into() })).unwrap();

    let failing_root = RawNode {
        layer_name: "failing-layer".into(),
        function: "fail".into(),
        args: HashMap::new(),
        parallel: false,
        children: vec![],
    };

    let client = Arc::new(ScriptedLlmClient::new("scripted", "test-model"));
    client.push_feasibility(Ok(feasible()));
    client.push_tree(Ok(RawTree { root_nodes: vec![failing_root] }));
    client.push_evaluation(Ok(taskweave_kernel::EvaluationResult {
        is_satisfactory: false,
        reason: "failed".into(),
        needs_retry: true,
    }));
    client.push_retry(Err(taskweave_kernel::RouterError::CallFailed("retry provider unreachable".into())));

    // Plenty of attempts left, but an unavailable retry strategy must
    // terminate the request on the spot rather than silently continuing.
    let planner = planner_with_scripted_router(registry, client, 5);
    let history = planner.run("do the thing").await;

    assert_eq!(history.status, RequestStatus::Failed);
}

#[tokio::test]
async fn shutdown_runs_its_full_teardown_while_a_request_is_still_executing() {
    let registry = Arc::new(InMemoryCapabilityRegistry::with_defaults());
    registry.register(Box::new(SlowCapability { delay: Duration::from_millis(200) })).unwrap();

    let client = Arc::new(ScriptedLlmClient::new("scripted", "test-model"));
    client.push_feasibility(Ok(feasible()));
    client.push_tree(Ok(RawTree {
        root_nodes: vec![RawNode {
            layer_name: "slow-layer".into(),
            function: "echo".into(),
            args: {
                let mut m = HashMap::new();
                m.insert("message".to_string(), serde_json::json!("still running"));
                m
            },
            parallel: false,
            children: vec![],
        }],
    }));
    client.push_evaluation(Ok(taskweave_kernel::EvaluationResult {
        is_satisfactory: true,
        reason: "matches".into(),
        needs_retry: false,
    }));

    let planner = Arc::new(planner_with_scripted_router(registry, client, 5));
    let request = {
        let planner = planner.clone();
        tokio::spawn(async move { planner.run("echo slowly").await })
    };

    // Give the node a moment to start so shutdown genuinely races a request
    // in flight rather than one that hasn't begun yet.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let steps: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let hook = |steps: Arc<Mutex<Vec<&'static str>>>, label: &'static str| -> ShutdownHook {
        Arc::new(move || {
            let steps = steps.clone();
            Box::pin(async move {
                steps.lock().unwrap().push(label);
            })
        })
    };
    let coordinator = ShutdownCoordinator::new()
        .with_heartbeat_stop(hook(steps.clone(), "heartbeat"))
        .with_refuse_new_requests(hook(steps.clone(), "refuse"))
        .with_close_orchestrator(hook(steps.clone(), "orchestrator"))
        .with_cancel_background_scope(hook(steps.clone(), "cancel"));

    // Shutdown tears down its own collaborators (heartbeat, registry
    // deregistration, ...) without waiting for in-flight requests to drain;
    // the planner task above is left running independently.
    let outcome = coordinator.shutdown("test teardown").await;
    assert_eq!(outcome, ShutdownOutcome::Completed);
    assert_eq!(*steps.lock().unwrap(), vec!["heartbeat", "refuse", "orchestrator", "cancel"]);

    let history = request.await.expect("planner task does not panic");
    assert_eq!(history.status, RequestStatus::Completed);
    assert_eq!(history.result.text.as_deref(), Some("still running"));
}
