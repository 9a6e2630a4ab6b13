//! Prompt rendering with one `minijinja` template per task type.

use super::WorkspaceError;
use crate::task::domain::{AttemptNumber, Task};
use minijinja::Environment;
use serde::Serialize;
use std::collections::HashMap;

/// Template used for task types without a dedicated one.
pub const FALLBACK_TEMPLATE: &str = "\
# {{ task.type }} task {{ task.id }}

Source: {{ task.source }} ({{ task.event_type }}) for resource `{{ task.resource_id }}`.
Priority: {{ task.priority }}. Attempt: {{ task.attempt }}.
{% if task.repository %}Repository: {{ task.repository }}
{% endif %}
Context files:
{% for file in context_files %}- {{ context_dir }}/{{ file }}
{% else %}- (none)
{% endfor %}
Write your result as JSON to `{{ output_path }}` with the fields
`success`, `actions` and `analysis_summary`.
";

#[derive(Debug, Serialize)]
struct TaskView<'a> {
    id: String,
    #[serde(rename = "type")]
    task_type: &'a str,
    source: &'a str,
    event_type: &'a str,
    resource_id: &'a str,
    priority: u8,
    repository: Option<&'a str>,
    attempt: u32,
}

#[derive(Debug, Serialize)]
struct PromptContext<'a> {
    task: TaskView<'a>,
    context_files: &'a [String],
    context_dir: &'a str,
    output_path: &'a str,
}

/// Paths a prompt may reference.
#[derive(Debug, Clone, Copy)]
pub struct PromptPaths<'a> {
    /// Absolute context directory.
    pub context_dir: &'a str,
    /// Absolute output slot.
    pub output_path: &'a str,
}

/// Renders the worker prompt for a task.
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    templates: HashMap<String, String>,
    fallback: String,
}

impl Default for PromptRenderer {
    fn default() -> Self {
        Self {
            templates: HashMap::new(),
            fallback: FALLBACK_TEMPLATE.to_owned(),
        }
    }
}

impl PromptRenderer {
    /// Creates a renderer with only the fallback template.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the template for a task type.
    #[must_use]
    pub fn with_template(mut self, task_type: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(task_type.into(), template.into());
        self
    }

    /// Replaces the fallback template.
    #[must_use]
    pub fn with_fallback(mut self, template: impl Into<String>) -> Self {
        self.fallback = template.into();
        self
    }

    /// Renders the prompt for one attempt of `task`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError::Template`] when the template is invalid or
    /// references something the context cannot provide.
    pub fn render(
        &self,
        task: &Task,
        attempt: AttemptNumber,
        context_files: &[String],
        paths: PromptPaths<'_>,
    ) -> Result<String, WorkspaceError> {
        let task_type = task.task_type().as_str();
        let template = self
            .templates
            .get(task_type)
            .map_or(self.fallback.as_str(), String::as_str);
        let origin = task.origin();
        let context = PromptContext {
            task: TaskView {
                id: task.id().to_string(),
                task_type,
                source: origin.source.as_str(),
                event_type: &origin.event_type,
                resource_id: origin.resource_id.as_str(),
                priority: task.priority().value(),
                repository: task.repository().map(|repo| repo.as_str()),
                attempt: attempt.value(),
            },
            context_files,
            context_dir: paths.context_dir,
            output_path: paths.output_path,
        };

        let mut environment = Environment::new();
        environment.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
        environment
            .render_str(template, context)
            .map_err(|error| WorkspaceError::Template {
                task_type: task_type.to_owned(),
                reason: error.to_string(),
            })
    }
}
