//! End-to-end runs of built-in and YAML flows against the scripted engine

use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

use uisnap_harness::config::TimeoutConfig;
use uisnap_harness::scripted::{Fault, ScriptedEngine};
use uisnap_harness::{
    scenarios, BrowserEngine, CheckpointOutcome, CredentialMode, Flow, FlowRunner, RunConfig, RunResult, Stage,
};

fn config(dir: &Path) -> RunConfig {
    RunConfig {
        output_dir: dir.to_path_buf(),
        preflight: false,
        timeouts: TimeoutConfig {
            ui_ms: 100,
            navigation_ms: 100,
            action_ms: 100,
            grace_ms: 50,
            launch_ms: 500,
            preflight_ms: 100,
        },
        ..Default::default()
    }
}

/// Runner whose single session uses `engine`
fn runner_with(config: RunConfig, engine: ScriptedEngine) -> FlowRunner {
    let slot = Mutex::new(Some(engine));
    FlowRunner::new(
        config,
        Arc::new(move || -> Box<dyn BrowserEngine> { Box::new(slot.lock().take().unwrap_or_default()) }),
    )
}

/// Logging in with the seeded account captures the dashboard
#[tokio::test]
async fn login_dashboard_is_captured() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let log = engine.log();
    let runner = runner_with(config(dir.path()), engine);

    let flow = scenarios::builtin("login-dashboard").unwrap();
    let result = runner.run(&flow).await.expect("run");

    assert_eq!(result.len(), 1);
    assert_eq!(
        result.get("dashboard"),
        Some(&CheckpointOutcome::Captured { path: dir.path().join("dashboard.png") })
    );
    assert!(dir.path().join("dashboard.png").exists());

    let entries = log.entries();
    assert!(entries.contains(&"goto http://localhost:5173/login".to_string()));
    assert!(entries.contains(&r#"fill input[name="email"] = test@example.com"#.to_string()));
    assert!(entries.contains(&"wait_for_url **/dashboard".to_string()));
    assert_eq!(log.count("close"), 1);
}

/// A login form that never renders fails the checkpoint, leaves a fallback
/// capture and still closes the session
#[tokio::test]
async fn missing_login_form_records_wait_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new().fault("wait_for_selector", r#"input[name="email"]"#, Fault::Timeout);
    let log = engine.log();
    let runner = runner_with(config(dir.path()), engine);

    let flow = scenarios::builtin("login-dashboard").unwrap();
    let result = runner.run(&flow).await.expect("run");

    assert_eq!(
        result.get("dashboard"),
        Some(&CheckpointOutcome::Failed {
            reason: r#"WaitTimeoutError: input[name="email"]"#.to_string()
        })
    );
    assert!(!dir.path().join("dashboard.png").exists());
    assert!(dir.path().join("error_dashboard.png").exists());
    assert_eq!(result.fallbacks.len(), 1);
    assert_eq!(log.count("fill"), 0);
    assert_eq!(log.count("screenshot"), 1);
    assert_eq!(log.count("close"), 1);
}

/// Every content item is attempted even when the API rejects one
#[tokio::test]
async fn rich_qa_posts_every_item() {
    let dir = tempfile::tempdir().unwrap();
    let seen: Arc<Mutex<Option<Value>>> = Arc::default();
    let seen_by_handler = seen.clone();
    let engine = ScriptedEngine::new().on_evaluate(move |_, arg| {
        *seen_by_handler.lock() = Some(arg.clone());
        let results: Vec<Value> = arg["items"]
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .map(|item| {
                        let status = if item["title"] == "asfdはsd" { 500 } else { 201 };
                        json!({ "title": item["title"], "status": status })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(Value::Array(results))
    });
    let runner = runner_with(config(dir.path()), engine);

    let flow = scenarios::builtin("sns-qa-rich").unwrap();
    let result = runner.run(&flow).await.expect("run");

    assert!(matches!(result.get("qa_list"), Some(CheckpointOutcome::Captured { .. })));

    let arg = seen.lock().clone().expect("create_posts was evaluated");
    assert_eq!(arg["items"].as_array().unwrap().len(), 4);
    assert_eq!(arg["items"][0]["type"], "question");
    assert_eq!(arg["api_url"], "http://localhost:8000");
    assert_eq!(arg["react"], true);
    assert_eq!(arg["emojis"].as_array().unwrap().len(), 4);

    let output = result
        .steps
        .iter()
        .find_map(|s| s.output.as_ref())
        .and_then(Value::as_array)
        .expect("evaluate output recorded");
    assert_eq!(output.len(), 4);
    assert_eq!(output.iter().filter(|r| r["status"] == 500).count(), 1);
}

/// A failed registration does not cost the login capture, and the feed is
/// captured after the reaction with the blog post already created
#[tokio::test]
async fn sns_tour_checkpoints_stand_alone() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new().fault("wait_for_url", "**/login", Fault::Timeout);
    let log = engine.log();
    let runner = runner_with(config(dir.path()), engine);

    let flow = scenarios::builtin("sns-tour").unwrap();
    let result = runner.run(&flow).await.expect("run");

    assert!(result.all_captured(), "{:?}", result.checkpoints);

    let entries = log.entries();
    let position = |needle: &str| {
        entries
            .iter()
            .position(|e| e.starts_with(needle))
            .unwrap_or_else(|| panic!("no call starting with {}", needle))
    };
    assert!(position("goto http://localhost:5173/login") < position("screenshot login.png"));
    assert!(position(r#"click button:has-text("リアクション")"#) < position("screenshot feed_with_post.png"));

    let blog_fill = position(r#"fill input[placeholder="タイトル"]"#);
    assert!(position("click text=ブログ") < blog_fill);
    assert!(blog_fill < position("screenshot blog_list.png"));
}

#[tokio::test]
async fn confirmation_dialogs_do_not_stall_the_run() {
    for (auto_accept, expected) in [(true, "dialog accept"), (false, "dialog dismiss")] {
        let dir = tempfile::tempdir().unwrap();
        let engine = ScriptedEngine::new().dialog_on_click("delete");
        let log = engine.log();
        let runner = runner_with(
            RunConfig {
                auto_accept_dialogs: auto_accept,
                ..config(dir.path())
            },
            engine,
        );

        let flow = Flow::builder("dialogs")
            .stage(Stage::checkpoint("deleted").click("button.delete").screenshot("deleted"))
            .build()
            .unwrap();
        let result = runner.run(&flow).await.expect("run");

        assert!(result.all_captured());
        assert!(log.entries().contains(&expected.to_string()));
    }
}

#[tokio::test]
async fn session_init_failure_still_closes_once() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new().fail_launch("chromium not installed");
    let log = engine.log();
    let runner = runner_with(config(dir.path()), engine);

    let flow = scenarios::builtin("login-dashboard").unwrap();
    let err = runner.run(&flow).await.unwrap_err();

    assert_eq!(err.kind(), "SessionInitError");
    assert_eq!(log.count("goto"), 0);
    assert_eq!(log.count("close"), 1);
}

#[tokio::test]
async fn every_checkpoint_is_reported_when_everything_fails() {
    let dir = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new()
        .fault("goto", "", Fault::Fail("net::ERR_CONNECTION_REFUSED".into()))
        .fault("fill", "", Fault::Fail("element not found".into()));
    let runner = runner_with(config(dir.path()), engine);

    let flow = scenarios::builtin("laravel-tour").unwrap();
    let result = runner.run(&flow).await.expect("run");

    assert_eq!(result.len(), flow.checkpoints().len());
    assert_eq!(result.failed(), 2);
    for entry in &result.checkpoints {
        match &entry.outcome {
            CheckpointOutcome::Failed { reason } => assert!(reason.starts_with("StepExecutionError:")),
            other => panic!("{} unexpectedly {:?}", entry.name, other),
        }
    }
    assert_eq!(result.fallbacks.len(), 2);
}

/// Same flow, same artifact names; only the identity differs
#[tokio::test]
async fn repeated_runs_differ_only_in_identity() {
    let flow = scenarios::builtin("login-dashboard").unwrap();
    let mut runs: Vec<RunResult> = Vec::new();

    for _ in 0..2 {
        let dir = tempfile::tempdir().unwrap();
        let runner = FlowRunner::dry_run(RunConfig {
            credentials: Some(CredentialMode::default()),
            ..config(dir.path())
        });
        runs.push(runner.run(&flow).await.expect("run"));
    }

    assert_eq!(runs[0].artifact_names(), runs[1].artifact_names());
    assert_eq!(runs[0].artifact_names(), flow.artifact_names());
    assert_ne!(runs[0].username, runs[1].username);
    assert_ne!(runs[0].run_id, runs[1].run_id);
}

#[tokio::test]
async fn yaml_flows_run_like_builtins() {
    let flows_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        flows_dir.path().join("search.yaml"),
        r#"
name: search
identity:
  mode: fixed
  username: test@example.com
  password: password123
stages:
  - checkpoint: results
    steps:
      - action: navigate
        url: ${base_url}/search
      - action: fill
        selector: input[type="search"]
        value: ${username}
      - action: press
        key: Enter
      - action: wait_for
        condition:
          kind: text
          text: results
      - action: screenshot
        name: results
"#,
    )
    .unwrap();

    let flows = Flow::load_all(flows_dir.path()).unwrap();
    assert_eq!(flows.len(), 1);

    let out = tempfile::tempdir().unwrap();
    let engine = ScriptedEngine::new();
    let log = engine.log();
    let runner = runner_with(config(out.path()), engine);
    let result = runner.run(&flows[0]).await.expect("run");

    assert!(result.all_captured());
    assert_eq!(result.username.as_deref(), Some("test@example.com"));
    assert!(log.entries().contains(&"wait_for_selector text=results".to_string()));
    assert!(log.entries().contains(&"press Enter".to_string()));
    assert!(out.path().join("run-result.json").exists());
}
