//! Result artifact validation.

use super::{OutputError, OutputValidator};
use crate::task::domain::{AttemptNumber, TaskId};
use crate::workspace::Workspace;
use camino::Utf8PathBuf;
use chrono::{TimeZone, Utc};
use rstest::rstest;
use serde_json::json;
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{Registry, fmt};

/// In-memory log sink shared with a `fmt` layer.
#[derive(Clone, Default)]
struct CapturedLog(Arc<Mutex<Vec<u8>>>);

impl CapturedLog {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log lock")).into_owned()
    }
}

impl io::Write for CapturedLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn artifact(value: &serde_json::Value) -> String {
    value.to_string()
}

#[rstest]
fn valid_result_with_actions_is_accepted() {
    let raw = artifact(&json!({
        "success": true,
        "analysis_summary": "Labelled as crash",
        "actions": [
            {
                "type": "label_added",
                "platform": "tracker",
                "target_resource_id": "X-1",
                "timestamp": "2026-05-01T10:00:00Z",
                "success": true,
                "detail": "bug"
            },
            {
                "type": "comment_posted",
                "platform": "tracker",
                "target_resource_id": "X-1",
                "detail": {"chars": 120}
            }
        ]
    }));

    let result = OutputValidator::parse_str(&raw).expect("artifact is valid");

    assert!(result.success);
    assert_eq!(result.dropped_actions, 0);
    assert_eq!(result.actions.len(), 2);
    let [first, second] = result.actions.as_slice() else {
        panic!("expected two actions");
    };
    assert_eq!(
        first.timestamp,
        Utc.with_ymd_and_hms(2026, 5, 1, 10, 0, 0).single()
    );
    assert_eq!(first.detail.as_deref(), Some("bug"));
    assert!(!second.success);
    assert_eq!(second.timestamp, None);
    assert_eq!(second.detail.as_deref(), Some(r#"{"chars":120}"#));
}

#[rstest]
fn empty_action_list_is_a_valid_no_op() {
    let raw = artifact(&json!({"success": true, "actions": [], "analysis_summary": ""}));

    let result = OutputValidator::parse_str(&raw).expect("no-op result is valid");

    assert!(result.actions.is_empty());
}

#[rstest]
#[case(json!({"type": "label_added", "platform": "tracker"}))]
#[case(json!({"type": "label_added", "platform": "tracker", "target_resource_id": "  "}))]
#[case(json!({"type": "label_added", "platform": 7, "target_resource_id": "X-1"}))]
#[case(json!("label_added"))]
fn invalid_actions_are_dropped_individually(#[case] bad_action: serde_json::Value) {
    let raw = artifact(&json!({
        "success": true,
        "analysis_summary": "done",
        "actions": [
            bad_action,
            {"type": "label_added", "platform": "tracker", "target_resource_id": "X-1"}
        ]
    }));

    let result = OutputValidator::parse_str(&raw).expect("artifact is still valid");

    assert_eq!(result.dropped_actions, 1);
    assert_eq!(result.actions.len(), 1);
}

#[rstest]
#[case("", "malformed: invalid JSON (Eof)")]
#[case("{\"success\": nope}", "malformed: invalid JSON (Syntax)")]
#[case("[1, 2]", "malformed: top level is not an object")]
#[case(r#"{"actions": [], "analysis_summary": ""}"#, "malformed: missing field `success`")]
#[case(
    r#"{"success": "yes", "actions": [], "analysis_summary": ""}"#,
    "malformed: field `success` is not a boolean"
)]
#[case(
    r#"{"success": true, "actions": {}, "analysis_summary": ""}"#,
    "malformed: field `actions` is not an array"
)]
#[case(r#"{"success": true, "actions": []}"#, "malformed: missing field `analysis_summary`")]
fn malformed_artifacts_have_stable_signatures(#[case] raw: &str, #[case] signature: &str) {
    let first = OutputValidator::parse_str(raw).expect_err("artifact is invalid");
    let second = OutputValidator::parse_str(raw).expect_err("artifact is invalid");

    assert_eq!(first.signature(), signature);
    assert_eq!(first.signature(), second.signature());
}

#[rstest]
fn missing_artifact_has_its_own_signature() {
    let error = OutputError::Missing {
        path: "/ws/output/result.json".into(),
    };

    assert_eq!(error.signature(), "missing");
}

#[rstest]
fn actions_are_stamped_with_validation_time_when_undated() {
    let raw = artifact(&json!({
        "success": true,
        "analysis_summary": "done",
        "actions": [{"type": "label_added", "platform": "tracker", "target_resource_id": "X-1"}]
    }));
    let result = OutputValidator::parse_str(&raw).expect("artifact is valid");
    let task_id = TaskId::new();
    let validated_at = Utc.with_ymd_and_hms(2026, 5, 2, 8, 30, 0).single().expect("valid time");

    let actions = result.to_actions(task_id, AttemptNumber::first(), validated_at);

    assert_eq!(actions.len(), 1);
    let action = actions.first().expect("one action");
    assert_eq!(action.task_id(), task_id);
    assert_eq!(action.timestamp(), validated_at);
    assert!(!action.success());
}

#[rstest]
#[tokio::test]
async fn dropped_actions_are_logged_against_their_task() {
    let temp = tempfile::tempdir().expect("temp dir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf-8 temp path");
    let task_id = TaskId::new();
    let workspace = Workspace::new(task_id, AttemptNumber::first(), root, Vec::new());
    std::fs::create_dir_all(workspace.output_dir()).expect("output dir");
    let raw = artifact(&json!({
        "success": true,
        "analysis_summary": "partial",
        "actions": [{"type": "label_added", "platform": "tracker"}]
    }));
    std::fs::write(workspace.result_path(), raw).expect("write artifact");

    let log = CapturedLog::default();
    let writer = log.clone();
    let subscriber =
        Registry::default().with(fmt::layer().with_ansi(false).with_writer(move || writer.clone()));
    let _default = tracing::subscriber::set_default(subscriber);
    let result = OutputValidator::parse(&workspace).await.expect("artifact is valid");

    assert_eq!(result.dropped_actions, 1);
    let output = log.contents();
    assert!(output.contains("dropping invalid declared action"), "log: {output}");
    assert!(output.contains(&task_id.to_string()), "log: {output}");
}
