//! Ordering rules of the admission queue.

use crate::admission::{AdmissionQueue, Ticket};
use crate::task::domain::{Priority, TaskId};
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use rstest::{fixture, rstest};
use std::time::Duration;

#[fixture]
fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 8, 0, 0)
        .single()
        .expect("valid time")
}

fn ticket(priority: u8, queued_at: DateTime<Utc>) -> Ticket {
    Ticket::new(TaskId::new(), Priority::new(priority), queued_at)
}

#[rstest]
fn lower_priority_value_is_admitted_first(start: DateTime<Utc>) {
    let mut queue = AdmissionQueue::new(Duration::from_secs(60));
    let normal = ticket(5, start);
    let urgent = ticket(1, start + TimeDelta::seconds(1));
    queue.push(normal);
    queue.push(urgent);

    assert_eq!(queue.pop_next(start + TimeDelta::seconds(2)), Some(urgent));
    assert_eq!(queue.pop_next(start + TimeDelta::seconds(2)), Some(normal));
    assert_eq!(queue.pop_next(start), None);
}

#[rstest]
fn equal_priorities_are_first_in_first_out(start: DateTime<Utc>) {
    let mut queue = AdmissionQueue::new(Duration::from_secs(60));
    let tickets: Vec<Ticket> = (0..4)
        .map(|offset| ticket(3, start + TimeDelta::milliseconds(offset)))
        .collect();
    for queued in tickets.iter().rev() {
        queue.push(*queued);
    }

    let order: Vec<Ticket> = std::iter::from_fn(|| queue.pop_next(start)).collect();

    assert_eq!(order, tickets);
}

#[rstest]
fn enqueue_sequence_breaks_exact_ties(start: DateTime<Utc>) {
    let mut queue = AdmissionQueue::new(Duration::from_secs(60));
    let first = ticket(3, start);
    let second = ticket(3, start);
    queue.push(first);
    queue.push(second);

    assert_eq!(queue.pop_next(start), Some(first));
    assert_eq!(queue.pop_next(start), Some(second));
}

#[rstest]
#[case(0, 7)]
#[case(59, 7)]
#[case(60, 6)]
#[case(300, 2)]
#[case(3_600, 0)]
fn waiting_promotes_one_band_per_starvation_age(
    start: DateTime<Utc>,
    #[case] waited_secs: i64,
    #[case] expected: u8,
) {
    let queue = AdmissionQueue::new(Duration::from_secs(60));
    let waiting = ticket(7, start);

    let effective = queue.effective_priority(&waiting, start + TimeDelta::seconds(waited_secs));

    assert_eq!(effective, Priority::new(expected));
}

#[rstest]
fn promoted_ticket_overtakes_fresh_urgent_work(start: DateTime<Utc>) {
    let mut queue = AdmissionQueue::new(Duration::from_secs(10));
    let old = ticket(4, start);
    queue.push(old);
    let now = start + TimeDelta::seconds(40);
    let fresh = ticket(0, now);
    queue.push(fresh);

    assert_eq!(queue.pop_next(now), Some(old));
}

#[rstest]
fn duplicate_and_withdrawn_tickets(start: DateTime<Utc>) {
    let mut queue = AdmissionQueue::new(Duration::from_secs(60));
    let waiting = ticket(5, start);

    assert!(queue.push(waiting));
    assert!(!queue.push(waiting));
    assert_eq!(queue.len(), 1);
    assert!(queue.remove(waiting.task_id));
    assert!(!queue.remove(waiting.task_id));
    assert!(queue.is_empty());
}
