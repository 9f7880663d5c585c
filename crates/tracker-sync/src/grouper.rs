//! Folding flat rows into nested payloads
//!
//! Rows arrive one enrollment-with-at-most-one-event at a time. The grouper
//! keeps the first row of every `program_unique_id` as the enrollment and
//! appends the events of later rows with the same key. Output order is the
//! order in which keys were first seen, and events keep row arrival order.
//! Reconciliation correlates by position, so this order must survive
//! unchanged until the response is read.

use std::collections::HashMap;
use tracing::debug;

use crate::error::Result;
use crate::models::{EnrollmentPayload, EnrollmentRow, EventPayload};

/// Group rows into payloads, preserving first-appearance order
pub fn group_rows<I>(rows: I) -> Result<Vec<EnrollmentPayload>>
where
    I: IntoIterator<Item = EnrollmentRow>,
{
    let mut payloads: Vec<EnrollmentPayload> = Vec::new();
    let mut position_by_key: HashMap<String, usize> = HashMap::new();
    let mut row_count = 0usize;

    for row in rows {
        row_count += 1;
        let event = EventPayload::from_row(&row)?;

        let index = match position_by_key.get(&row.program_unique_id) {
            Some(&index) => index,
            None => {
                payloads.push(EnrollmentPayload::from_row(&row));
                position_by_key.insert(row.program_unique_id.clone(), payloads.len() - 1);
                payloads.len() - 1
            },
        };

        if let Some(event) = event {
            payloads[index].events.push(event);
        }
    }

    debug!(
        rows = row_count,
        enrollments = payloads.len(),
        events = payloads.iter().map(|p| p.events.len()).sum::<usize>(),
        "Grouped rows into enrollment payloads"
    );

    Ok(payloads)
}
