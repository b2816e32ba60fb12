use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use tracing::{debug, info};

use super::calendar::advance;
use super::error::SchedulingError;
use crate::config::RolloverPolicy;
use crate::store::{Frequency, Tables};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RolloverOutcome {
    pub advanced: usize,
    pub deleted: usize,
}

/// Sweeps every schedule that started before `now`: elapsed one-shots are deleted,
/// recurring anchors move forward keeping their duration and interviewers.
pub fn sweep(
    tables: &mut Tables,
    now: DateTime<Utc>,
    zone: FixedOffset,
    policy: RolloverPolicy,
) -> Result<RolloverOutcome, SchedulingError> {
    let mut outcome = RolloverOutcome::default();

    for id in tables.schedule_ids() {
        let Some(schedule) = tables.schedule(id) else {
            continue;
        };
        if schedule.start >= now {
            continue;
        }
        if schedule.frequency == Frequency::None {
            let removed = tables.remove_schedule(id)?;
            debug!(schedule = %removed.hash_key, "elapsed schedule deleted");
            outcome.deleted += 1;
            continue;
        }

        let frequency = schedule.frequency;
        let length = schedule.end - schedule.start;
        let mut start = schedule.start;
        loop {
            start = advance(frequency, start, zone).ok_or_else(|| {
                SchedulingError::Internal(format!("schedule {} cannot advance further", id.0))
            })?;
            if policy == RolloverPolicy::SinglePeriod || start >= now {
                break;
            }
        }

        if let Some(row) = tables.schedule_mut(id) {
            row.start = start;
            row.end = start + length;
            row.updated_at = now;
        }
        outcome.advanced += 1;
    }

    info!(
        advanced = outcome.advanced,
        deleted = outcome.deleted,
        "schedule rollover swept"
    );
    Ok(outcome)
}
