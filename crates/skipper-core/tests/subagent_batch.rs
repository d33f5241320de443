//! Subagent factory integration tests: mixed outcomes, artifacts, context store

mod support;

use std::sync::Arc;
use std::time::Duration;

use skipper_core::paths::sha256_hex;
use skipper_core::subagent::{is_valid_batch_id, is_valid_task_id};
use skipper_core::{
    BatchReport, CompletionClient, EditorStore, FactoryDeps, FactoryInput, Manager, RunContext,
};
use support::{start_mock_llm_server_with, Scenario};

fn deps_for(server_endpoint: &str, editor_root: &tempfile::TempDir) -> FactoryDeps {
    FactoryDeps {
        client: Arc::new(CompletionClient::from_parts(server_endpoint, "test-key")),
        editor: Arc::new(EditorStore::with_root(editor_root.path().to_path_buf())),
        default_model: "m-test".to_string(),
        system_prompt: "You are the batch parent.".to_string(),
        experimental: false,
        child_depth: 1,
    }
}

#[tokio::test]
async fn batch_with_mixed_outcomes() {
    // Worker requests are concurrent, so responses are matched on the task
    // text instead of arrival order.
    let server = start_mock_llm_server_with(|body| {
        if body.contains("task B") {
            Scenario::Delayed(3_000, Box::new(Scenario::Text("too late".into())))
        } else if body.contains("task C") {
            Scenario::Text(String::new())
        } else {
            Scenario::Text("did task A".into())
        }
    });

    let editor_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let manager = Manager::new();

    let input = FactoryInput {
        task_list_name: "mixed".into(),
        mega_prompt: "task A\n---TASK---\ntask B\n---TASK---\ntask C".into(),
        split_symbol: "---TASK---".into(),
        max_concurrency: 2,
        timeout_sec: 1,
        ttl_seconds: 60,
        output_dir: out_dir.path().to_string_lossy().into_owned(),
        ..Default::default()
    };

    let report = manager
        .run_factory(&RunContext::new(), input, deps_for(&server.endpoint, &editor_root))
        .await
        .expect("batch runs");

    assert!(is_valid_batch_id(&report.batch_id));
    assert_eq!(report.task_list_name, "mixed");
    assert_eq!(report.total_started, 3);
    assert_eq!(report.noerror.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.unknown.len(), 1);
    assert_eq!(
        report.noerror.len() + report.failed.len() + report.unknown.len(),
        report.total_started
    );

    assert!(report.noerror[0].task_id.starts_with("001_"));
    assert_eq!(report.failed[0].error_code, "timeout");
    assert!(report.failed[0].task_id.starts_with("002_"));
    assert_eq!(report.unknown[0].error_code, "empty_output");
    assert!(report.unknown[0].task_id.starts_with("003_"));

    for brief in report
        .noerror
        .iter()
        .chain(&report.failed)
        .chain(&report.unknown)
    {
        assert!(is_valid_task_id(&brief.task_id), "{}", brief.task_id);
        assert!(!brief.output_file.is_empty());
        let body = std::fs::read_to_string(&brief.output_file).expect("task file exists");
        assert_eq!(sha256_hex(&body), brief.output_hash);
        assert!(body.starts_with(&format!("TaskID: {}", brief.task_id)));
    }

    // report.json is pretty-printed and parses back to the same report.
    assert!(!report.report_file_path.is_empty());
    let raw = std::fs::read_to_string(&report.report_file_path).unwrap();
    assert!(raw.contains("\n  \"batch_id\""));
    let parsed: BatchReport = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed.batch_id, report.batch_id);
    assert_eq!(parsed.total_started, 3);
    assert_eq!(parsed.failed[0].error_code, "timeout");

    manager.close();
}

#[tokio::test]
async fn successful_batch_and_consumed_context() {
    let server = start_mock_llm_server_with(|_| Scenario::Text("all done here".into()));
    let editor_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let manager = Manager::new();

    let input = FactoryInput {
        task_list_name: "Happy Path".into(),
        mega_prompt: "alpha\n---TASK---\nbeta".into(),
        split_symbol: "---TASK---".into(),
        max_concurrency: 2,
        timeout_sec: 120,
        ttl_seconds: 60,
        output_dir: out_dir.path().to_string_lossy().into_owned(),
        ..Default::default()
    };

    let report = manager
        .run_factory(&RunContext::new(), input, deps_for(&server.endpoint, &editor_root))
        .await
        .unwrap();

    assert_eq!(report.task_list_name, "happy_path");
    assert_eq!(report.noerror.len(), 2);
    assert!(report.failed.is_empty());
    assert!(report.unknown.is_empty());

    let task_id = report.noerror[0].task_id.clone();
    let summary = manager
        .task_context_summary(&task_id, true)
        .await
        .expect("context available");
    assert!(summary.starts_with(&format!("TaskID: {}", task_id)));
    assert!(summary.contains("Status: NOERROR"));
    assert!(summary.contains("OutputHash: "));
    assert!(summary.contains("LastOutputSnippet: "));

    let err = manager
        .task_context_summary(&task_id, true)
        .await
        .unwrap_err();
    assert!(err
        .to_string()
        .contains(&format!("task context not found: {}", task_id)));

    // The sibling task was not consumed.
    assert!(manager
        .task_context_summary(&report.noerror[1].task_id, false)
        .await
        .is_ok());

    manager.close();
}

#[tokio::test]
async fn empty_mega_prompt_is_rejected_before_any_work() {
    let server = start_mock_llm_server_with(|_| Scenario::Text("unused".into()));
    let editor_root = tempfile::tempdir().unwrap();
    let manager = Manager::new();

    let input = FactoryInput {
        mega_prompt: "   \n  ".into(),
        ..Default::default()
    };
    let err = manager
        .run_factory(&RunContext::new(), input, deps_for(&server.endpoint, &editor_root))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("mega_prompt is required"));

    manager.close();
}

#[tokio::test]
async fn missing_model_everywhere_is_a_config_error() {
    let server = start_mock_llm_server_with(|_| Scenario::Text("unused".into()));
    let editor_root = tempfile::tempdir().unwrap();
    let manager = Manager::new();

    let mut deps = deps_for(&server.endpoint, &editor_root);
    deps.default_model = String::new();
    let input = FactoryInput {
        mega_prompt: "one task".into(),
        ..Default::default()
    };
    let err = manager
        .run_factory(&RunContext::new(), input, deps)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("model is empty"));

    manager.close();
}

#[tokio::test]
async fn canceled_parent_scope_classifies_workers_as_canceled() {
    let server = start_mock_llm_server_with(|_| {
        Scenario::Delayed(2_000, Box::new(Scenario::Text("late".into())))
    });
    let editor_root = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    let manager = Manager::new();

    let ctx = RunContext::new();
    let canceller = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        canceller.cancel();
    });

    let input = FactoryInput {
        mega_prompt: "solo task".into(),
        timeout_sec: 120,
        ttl_seconds: 60,
        output_dir: out_dir.path().to_string_lossy().into_owned(),
        ..Default::default()
    };
    let report = manager
        .run_factory(&ctx, input, deps_for(&server.endpoint, &editor_root))
        .await
        .unwrap();

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].error_code, "canceled");

    manager.close();
}
