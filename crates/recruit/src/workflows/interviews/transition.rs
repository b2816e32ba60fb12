use serde::Serialize;
use tracing::info;

use super::error::SchedulingError;
use super::pipeline::status_after_event;
use crate::ids::HashKey;
use crate::store::{ApplicantId, PipelineEvent, SelectStatusId, Tables, TeamId};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub applicant: HashKey,
    pub event: PipelineEvent,
    pub from: HashKey,
    pub to: HashKey,
}

/// Moves an applicant of `team_id` along the team's binding for `event`.
pub fn apply_event(
    tables: &mut Tables,
    team_id: TeamId,
    applicant_id: ApplicantId,
    event: PipelineEvent,
) -> Result<Transition, SchedulingError> {
    let applicant = tables
        .applicant(applicant_id)
        .filter(|applicant| applicant.team_id == team_id)
        .ok_or(SchedulingError::NotFound("applicant"))?;
    let applicant_key = applicant.hash_key.clone();
    let previous = applicant.status_id;

    let next = status_after_event(tables, team_id, event)
        .ok_or(SchedulingError::InvalidEvent(event.label()))?;
    tables.set_applicant_status(applicant_id, next)?;

    let key_of = |id: SelectStatusId| {
        tables
            .status(id)
            .map(|status| status.hash_key.clone())
            .ok_or_else(|| SchedulingError::Internal(format!("status {} is missing", id.0)))
    };
    let transition = Transition {
        applicant: applicant_key,
        event,
        from: key_of(previous)?,
        to: key_of(next)?,
    };

    info!(
        applicant = %transition.applicant,
        event = event.label(),
        "pipeline event applied"
    );
    Ok(transition)
}
