//! Priority policies consulted when a task is created.

use super::InboundEvent;
use crate::task::domain::{Priority, TaskType};
use serde_json::Value;

/// Computes the priority of a task created from an event.
///
/// The dispatcher stores the returned value and never reinterprets it.
pub trait PriorityPolicy: Send + Sync {
    /// Returns the priority for `event` routed to `task_type`.
    fn assign(&self, event: &InboundEvent, task_type: &TaskType) -> Priority;
}

/// Assigns the same priority to every task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPriority(pub Priority);

impl Default for FixedPriority {
    fn default() -> Self {
        Self(Priority::NORMAL)
    }
}

impl PriorityPolicy for FixedPriority {
    fn assign(&self, _event: &InboundEvent, _task_type: &TaskType) -> Priority {
        self.0
    }
}

/// Keyword band: any payload string containing `keyword` maps to `priority`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    /// Lowercase keyword matched case-insensitively.
    pub keyword: String,
    /// Priority assigned on a match.
    pub priority: Priority,
}

/// Scans every string in the payload for severity keywords.
///
/// The most urgent matching rule wins; without a match the fallback applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordPriority {
    rules: Vec<KeywordRule>,
    fallback: Priority,
}

impl KeywordPriority {
    /// Creates a policy from `(keyword, priority)` pairs.
    #[must_use]
    pub fn new<I, S>(rules: I, fallback: Priority) -> Self
    where
        I: IntoIterator<Item = (S, Priority)>,
        S: AsRef<str>,
    {
        let rules = rules
            .into_iter()
            .map(|(keyword, priority)| KeywordRule {
                keyword: keyword.as_ref().trim().to_lowercase(),
                priority,
            })
            .filter(|rule| !rule.keyword.is_empty())
            .collect();
        Self { rules, fallback }
    }

    /// Common severity vocabulary for issue trackers and chat alerts.
    #[must_use]
    pub fn severity_defaults() -> Self {
        Self::new(
            [
                ("outage", Priority::new(0)),
                ("critical", Priority::new(1)),
                ("security", Priority::new(1)),
                ("urgent", Priority::new(2)),
                ("crash", Priority::new(2)),
                ("bug", Priority::new(4)),
            ],
            Priority::NORMAL,
        )
    }

    fn best_match(&self, text: &str) -> Option<Priority> {
        let lowered = text.to_lowercase();
        self.rules
            .iter()
            .filter(|rule| lowered.contains(&rule.keyword))
            .map(|rule| rule.priority)
            .min()
    }
}

impl PriorityPolicy for KeywordPriority {
    fn assign(&self, event: &InboundEvent, _task_type: &TaskType) -> Priority {
        let mut strings = Vec::new();
        collect_strings(&event.payload, &mut strings);
        strings
            .into_iter()
            .filter_map(|text| self.best_match(text))
            .min()
            .unwrap_or(self.fallback)
    }
}

fn collect_strings<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(text) => out.push(text),
        Value::Array(items) => items.iter().for_each(|item| collect_strings(item, out)),
        Value::Object(map) => map.values().for_each(|item| collect_strings(item, out)),
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}
