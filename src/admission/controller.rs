//! Actor owning admission slots and the waiting queue.

use super::queue::{AdmissionQueue, Ticket};
use crate::task::domain::TaskId;
use chrono::{DateTime, Utc};
use mockable::Clock;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::debug;

/// Errors returned by the admission controller handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// The controller actor has stopped.
    #[error("admission controller has stopped")]
    Closed,
}

/// Non-blocking view of admission state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AdmissionStatus {
    /// Slots currently leased.
    pub active: usize,
    /// Tickets waiting for a slot.
    pub queued: usize,
    /// Total slots.
    pub capacity: usize,
}

#[derive(Debug)]
enum Command {
    Enqueue {
        ticket: Ticket,
        reply: oneshot::Sender<bool>,
    },
    Admit {
        reply: oneshot::Sender<Lease>,
    },
    Release {
        lease_id: u64,
    },
    Withdraw {
        task_id: TaskId,
        reply: oneshot::Sender<bool>,
    },
}

/// Right to run one attempt. Dropping the lease frees its slot.
#[derive(Debug)]
pub struct Lease {
    id: u64,
    ticket: Ticket,
    admitted_at: DateTime<Utc>,
    commands: Option<mpsc::UnboundedSender<Command>>,
}

impl Lease {
    /// Task the slot was granted to.
    #[must_use]
    pub const fn task_id(&self) -> TaskId {
        self.ticket.task_id
    }

    /// Ticket that won the slot.
    #[must_use]
    pub const fn ticket(&self) -> &Ticket {
        &self.ticket
    }

    /// Time the slot was granted.
    #[must_use]
    pub const fn admitted_at(&self) -> DateTime<Utc> {
        self.admitted_at
    }

    fn disarm(&mut self) {
        self.commands = None;
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Some(commands) = self.commands.take() {
            // The actor may already be gone during shutdown.
            let _sent = commands.send(Command::Release { lease_id: self.id });
        }
    }
}

/// Handle to the admission actor.
#[derive(Debug, Clone)]
pub struct AdmissionController {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<AdmissionStatus>,
}

impl AdmissionController {
    /// Spawns the actor on the current Tokio runtime.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn spawn<C>(capacity: usize, starvation_age: Duration, clock: Arc<C>) -> Self
    where
        C: Clock + Send + Sync + 'static,
    {
        let slots = capacity.max(1);
        let (commands, inbox) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(AdmissionStatus {
            capacity: slots,
            ..AdmissionStatus::default()
        });
        let actor = AdmissionActor {
            queue: AdmissionQueue::new(starvation_age),
            capacity: slots,
            active: HashSet::new(),
            waiters: VecDeque::new(),
            next_lease: 0,
            clock,
            commands: commands.downgrade(),
            status: status_tx,
        };
        tokio::spawn(actor.run(inbox));
        Self { commands, status }
    }

    /// Registers a waiting task. Returns `false` if it is already queued.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Closed`] when the actor has stopped.
    pub async fn enqueue(&self, ticket: Ticket) -> Result<bool, AdmissionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Enqueue { ticket, reply })?;
        response.await.map_err(|_| AdmissionError::Closed)
    }

    /// Waits until a slot is free and a task is waiting, then leases the slot
    /// to the next task.
    ///
    /// Dropping the returned future while it is still waiting forfeits the
    /// turn without losing the ticket. If the actor has already handed over
    /// a lease when the future is dropped, the lease is dropped with it: the
    /// slot is released but the ticket is not re-queued. The coordinator
    /// only abandons admission on shutdown, and the task's stored `queued`
    /// state lets `Orchestrator::recover` enqueue it again.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Closed`] when the actor has stopped.
    pub async fn admit(&self) -> Result<Lease, AdmissionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Admit { reply })?;
        response.await.map_err(|_| AdmissionError::Closed)
    }

    /// Returns a slot to the pool.
    pub fn release(&self, lease: Lease) {
        drop(lease);
    }

    /// Removes a waiting task. Returns `false` if it was not queued.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Closed`] when the actor has stopped.
    pub async fn withdraw(&self, task_id: TaskId) -> Result<bool, AdmissionError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Withdraw { task_id, reply })?;
        response.await.map_err(|_| AdmissionError::Closed)
    }

    /// Returns the latest published counts without contacting the actor.
    #[must_use]
    pub fn status(&self) -> AdmissionStatus {
        *self.status.borrow()
    }

    /// Subscribes to status changes.
    #[must_use]
    pub fn watch_status(&self) -> watch::Receiver<AdmissionStatus> {
        self.status.clone()
    }

    fn send(&self, command: Command) -> Result<(), AdmissionError> {
        self.commands
            .send(command)
            .map_err(|_| AdmissionError::Closed)
    }
}

struct AdmissionActor<C> {
    queue: AdmissionQueue,
    capacity: usize,
    active: HashSet<u64>,
    waiters: VecDeque<oneshot::Sender<Lease>>,
    next_lease: u64,
    clock: Arc<C>,
    commands: mpsc::WeakUnboundedSender<Command>,
    status: watch::Sender<AdmissionStatus>,
}

impl<C> AdmissionActor<C>
where
    C: Clock + Send + Sync + 'static,
{
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>) {
        while let Some(command) = inbox.recv().await {
            let answer = self.handle(command);
            self.pump();
            self.publish();
            if let Some((reply, value)) = answer {
                let _delivered = reply.send(value);
            }
        }
        debug!("admission controller stopped");
    }

    /// Applies `command`. Boolean answers are returned so they are sent
    /// only after the status has been published.
    fn handle(&mut self, command: Command) -> Option<(oneshot::Sender<bool>, bool)> {
        match command {
            Command::Enqueue { ticket, reply } => Some((reply, self.queue.push(ticket))),
            Command::Admit { reply } => {
                self.waiters.push_back(reply);
                None
            }
            Command::Release { lease_id } => {
                self.active.remove(&lease_id);
                None
            }
            Command::Withdraw { task_id, reply } => Some((reply, self.queue.remove(task_id))),
        }
    }

    fn pump(&mut self) {
        while self.active.len() < self.capacity && !self.queue.is_empty() {
            let Some(waiter) = self.next_waiter() else {
                return;
            };
            let Some(commands) = self.commands.upgrade() else {
                return;
            };
            let now = self.clock.utc();
            let Some(ticket) = self.queue.pop_next(now) else {
                return;
            };

            let id = self.next_lease;
            self.next_lease = self.next_lease.wrapping_add(1);
            let lease = Lease {
                id,
                ticket,
                admitted_at: now,
                commands: Some(commands),
            };
            match waiter.send(lease) {
                Ok(()) => {
                    self.active.insert(id);
                    debug!(task_id = %ticket.task_id, priority = %ticket.priority, "task admitted");
                }
                Err(mut unclaimed) => {
                    unclaimed.disarm();
                    self.queue.push(unclaimed.ticket);
                }
            }
        }
    }

    fn next_waiter(&mut self) -> Option<oneshot::Sender<Lease>> {
        while let Some(waiter) = self.waiters.pop_front() {
            if !waiter.is_closed() {
                return Some(waiter);
            }
        }
        None
    }

    fn publish(&self) {
        let status = AdmissionStatus {
            active: self.active.len(),
            queued: self.queue.len(),
            capacity: self.capacity,
        };
        self.status.send_if_modified(|current| {
            let changed = *current != status;
            *current = status;
            changed
        });
    }
}
