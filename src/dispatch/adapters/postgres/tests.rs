//! Row conversion tests for the `PostgreSQL` event store.

use super::repository::{row_to_claim, row_to_event, to_claim_row, to_event_row};
use crate::dispatch::domain::{DedupeClaim, DedupeKey, EventId, InboundEvent, StoredEvent};
use crate::task::domain::{ResourceId, SourceTag, TaskId};
use chrono::{TimeZone, Utc};
use rstest::rstest;
use serde_json::json;
use std::time::Duration;

#[rstest]
fn event_rows_keep_the_event_verbatim() {
    let received_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid time");
    let stored = StoredEvent {
        id: EventId::new(),
        event: InboundEvent::new(" Tracker", "issue.created", "X-1 ", received_at)
            .with_payload(json!({"title": "Crash"})),
        stored_at: received_at,
    };

    let row = to_event_row(&stored);
    assert_eq!(row.source, " Tracker");

    assert_eq!(row_to_event(row), stored);
}

#[rstest]
fn claim_rows_round_trip_normalized_identifiers() {
    let source = SourceTag::new("tracker").expect("valid source");
    let resource_id = ResourceId::new("X-1").expect("valid resource");
    let received_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).single().expect("valid time");
    let claim = DedupeClaim {
        key: DedupeKey::compute(
            &source,
            "issue.created",
            &resource_id,
            received_at,
            Duration::from_secs(300),
        ),
        source,
        resource_id,
        task_id: TaskId::new(),
        received_at,
    };

    let restored = row_to_claim(to_claim_row(&claim)).expect("row converts back");

    assert_eq!(restored, claim);
}

#[rstest]
fn claim_row_with_blank_source_is_rejected() {
    let source = SourceTag::new("tracker").expect("valid source");
    let resource_id = ResourceId::new("X-1").expect("valid resource");
    let mut row = to_claim_row(&DedupeClaim {
        key: DedupeKey::from_raw("abc"),
        source,
        resource_id,
        task_id: TaskId::new(),
        received_at: Utc::now(),
    });
    row.source = "  ".to_owned();

    assert!(row_to_claim(row).is_err());
}
