//! Parses and checks `output/result.json`.

use super::{DeclaredAction, OutputError, WorkerResult};
use crate::workspace::Workspace;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::io::ErrorKind;
use tracing::{warn, warn_span};

/// Fields every action must carry as non-empty strings.
const REQUIRED_ACTION_FIELDS: [&str; 3] = ["type", "platform", "target_resource_id"];

#[derive(Debug, Deserialize)]
struct RawAction {
    #[serde(rename = "type")]
    action_type: Option<String>,
    platform: Option<String>,
    target_resource_id: Option<String>,
    timestamp: Option<String>,
    success: Option<bool>,
    detail: Option<Value>,
}

/// Reads and validates worker result artifacts.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputValidator;

impl OutputValidator {
    /// Reads the output slot of `workspace` and validates it.
    ///
    /// Problems with individual actions are logged against the workspace's
    /// task and attempt.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Missing`] when the file does not exist and
    /// [`OutputError::Malformed`] when it cannot be read or parsed.
    pub async fn parse(workspace: &Workspace) -> Result<WorkerResult, OutputError> {
        let path = workspace.result_path();
        match tokio::fs::read_to_string(&path).await {
            Ok(raw) => warn_span!(
                "result_artifact",
                task_id = %workspace.task_id(),
                attempt = %workspace.attempt(),
            )
            .in_scope(|| Self::parse_str(&raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(OutputError::Missing { path }),
            Err(err) => Err(OutputError::malformed(format!("unreadable ({:?})", err.kind()))),
        }
    }

    /// Validates an artifact already read into memory.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::Malformed`] for invalid JSON, a non-object
    /// document, or a missing or mistyped top-level field.
    pub fn parse_str(raw: &str) -> Result<WorkerResult, OutputError> {
        let document: Value = serde_json::from_str(raw)
            .map_err(|err| OutputError::malformed(format!("invalid JSON ({:?})", err.classify())))?;
        let Value::Object(fields) = document else {
            return Err(OutputError::malformed("top level is not an object"));
        };

        let success = required(&fields, "success", Value::as_bool, "a boolean")?;
        let analysis_summary = required(&fields, "analysis_summary", Value::as_str, "a string")?;
        let entries = required(&fields, "actions", Value::as_array, "an array")?;

        let mut actions = Vec::with_capacity(entries.len());
        let mut dropped_actions = 0;
        for (index, entry) in entries.iter().enumerate() {
            match declared_action(entry) {
                Ok(action) => actions.push(action),
                Err(problem) => {
                    dropped_actions += 1;
                    warn!(index, problem = %problem, "dropping invalid declared action");
                }
            }
        }

        Ok(WorkerResult {
            success,
            actions,
            analysis_summary: analysis_summary.to_owned(),
            dropped_actions,
        })
    }
}

fn required<'a, T>(
    fields: &'a Map<String, Value>,
    name: &str,
    extract: impl Fn(&'a Value) -> Option<T>,
    expected: &str,
) -> Result<T, OutputError> {
    let value = fields
        .get(name)
        .ok_or_else(|| OutputError::malformed(format!("missing field `{name}`")))?;
    extract(value)
        .ok_or_else(|| OutputError::malformed(format!("field `{name}` is not {expected}")))
}

fn declared_action(entry: &Value) -> Result<DeclaredAction, String> {
    if !entry.is_object() {
        return Err("action is not an object".to_owned());
    }
    let raw = RawAction::deserialize(entry).map_err(|err| err.to_string())?;

    let present = |value: Option<String>, field: &str| {
        value
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty())
            .ok_or_else(|| format!("missing `{field}`"))
    };
    let [type_field, platform_field, target_field] = REQUIRED_ACTION_FIELDS;
    let action_type = present(raw.action_type, type_field)?;
    let platform = present(raw.platform, platform_field)?;
    let target_resource_id = present(raw.target_resource_id, target_field)?;

    let timestamp = raw.timestamp.and_then(|text| {
        DateTime::parse_from_rfc3339(&text)
            .map(|parsed| parsed.with_timezone(&Utc))
            .map_err(|err| {
                warn!(timestamp = %text, error = %err, "ignoring unparseable action timestamp");
            })
            .ok()
    });
    let detail = raw.detail.and_then(|value| match value {
        Value::Null => None,
        Value::String(text) => Some(text),
        other => Some(other.to_string()),
    });

    Ok(DeclaredAction {
        action_type,
        platform,
        target_resource_id,
        timestamp,
        success: raw.success.unwrap_or(false),
        detail,
    })
}
