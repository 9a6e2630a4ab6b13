//! Routing of `(source, event type)` pairs to task types.

use crate::task::domain::{SourceTag, TaskDomainError, TaskType};
use serde::{Deserialize, Serialize};

/// Event type that matches every event of a source.
pub const WILDCARD_EVENT_TYPE: &str = "*";

/// Configured route as it appears in configuration documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Source tag the route applies to.
    pub source: String,
    /// Event type, or `*` for any event of the source.
    pub event_type: String,
    /// Task type produced for matching events.
    pub task_type: String,
}

impl Route {
    /// Creates a route.
    #[must_use]
    pub fn new(
        source: impl Into<String>,
        event_type: impl Into<String>,
        task_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            event_type: event_type.into(),
            task_type: task_type.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CompiledRoute {
    source: SourceTag,
    event_type: String,
    task_type: TaskType,
}

/// Pure lookup table from `(source, event type)` to task type.
///
/// Exact event-type matches win over a source wildcard; among equal matches
/// the first configured route wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingTable {
    routes: Vec<CompiledRoute>,
}

impl RoutingTable {
    /// Validates and compiles configured routes.
    ///
    /// # Errors
    ///
    /// Returns a [`TaskDomainError`] when a route names a blank source or an
    /// invalid task type.
    pub fn new<I>(routes: I) -> Result<Self, TaskDomainError>
    where
        I: IntoIterator<Item = Route>,
    {
        let compiled = routes
            .into_iter()
            .map(|route| {
                Ok(CompiledRoute {
                    source: SourceTag::new(route.source)?,
                    event_type: route.event_type.trim().to_owned(),
                    task_type: TaskType::new(route.task_type)?,
                })
            })
            .collect::<Result<Vec<_>, TaskDomainError>>()?;
        Ok(Self { routes: compiled })
    }

    /// Resolves the task type for an event, if any route matches.
    #[must_use]
    pub fn resolve(&self, source: &SourceTag, event_type: &str) -> Option<&TaskType> {
        let wanted = event_type.trim();
        let for_source = || self.routes.iter().filter(move |route| &route.source == source);

        for_source()
            .find(|route| route.event_type == wanted)
            .or_else(|| for_source().find(|route| route.event_type == WILDCARD_EVENT_TYPE))
            .map(|route| &route.task_type)
    }

    /// Returns the number of configured routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns `true` when no routes are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
