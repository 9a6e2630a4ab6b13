//! Priority queue with starvation promotion.

use crate::task::domain::{Priority, TaskId};
use chrono::{DateTime, Utc};
use std::time::Duration;

/// A task waiting for an admission slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    /// Waiting task.
    pub task_id: TaskId,
    /// Priority stored on the task.
    pub priority: Priority,
    /// Time the task entered the queue.
    pub queued_at: DateTime<Utc>,
}

impl Ticket {
    /// Creates a ticket.
    #[must_use]
    pub const fn new(task_id: TaskId, priority: Priority, queued_at: DateTime<Utc>) -> Self {
        Self {
            task_id,
            priority,
            queued_at,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    ticket: Ticket,
    seq: u64,
}

/// Waiting tickets ordered by effective priority, queued-at and sequence.
///
/// Promotion is computed at selection time, so no timer is needed: a ticket
/// that waited `k × starvation_age` is compared `k` bands more urgent than
/// its stored priority.
#[derive(Debug, Clone)]
pub struct AdmissionQueue {
    entries: Vec<Entry>,
    next_seq: u64,
    starvation_age: Duration,
}

impl AdmissionQueue {
    /// Creates an empty queue.
    #[must_use]
    pub const fn new(starvation_age: Duration) -> Self {
        Self {
            entries: Vec::new(),
            next_seq: 0,
            starvation_age,
        }
    }

    /// Adds a ticket. Returns `false` if the task is already queued.
    pub fn push(&mut self, ticket: Ticket) -> bool {
        if self.contains(ticket.task_id) {
            return false;
        }
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.entries.push(Entry { ticket, seq });
        true
    }

    /// Removes and returns the ticket that should be admitted next.
    pub fn pop_next(&mut self, now: DateTime<Utc>) -> Option<Ticket> {
        let position = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, entry)| {
                (
                    self.effective_priority(&entry.ticket, now),
                    entry.ticket.queued_at,
                    entry.seq,
                )
            })
            .map(|(position, _)| position)?;
        Some(self.entries.swap_remove(position).ticket)
    }

    /// Removes the ticket of `task_id`. Returns `false` if it was not queued.
    pub fn remove(&mut self, task_id: TaskId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.ticket.task_id != task_id);
        self.entries.len() != before
    }

    /// Returns `true` when `task_id` is waiting.
    #[must_use]
    pub fn contains(&self, task_id: TaskId) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.ticket.task_id == task_id)
    }

    /// Returns the priority a ticket competes with at `now`.
    #[must_use]
    pub fn effective_priority(&self, ticket: &Ticket, now: DateTime<Utc>) -> Priority {
        let waited_ms = (now - ticket.queued_at).num_milliseconds().max(0);
        let age_ms = i64::try_from(self.starvation_age.as_millis()).unwrap_or(i64::MAX);
        let bands = waited_ms.checked_div(age_ms).unwrap_or(0);
        ticket
            .priority
            .promoted(u8::try_from(bands).unwrap_or(u8::MAX))
    }

    /// Returns the number of waiting tickets.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when nothing is waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
