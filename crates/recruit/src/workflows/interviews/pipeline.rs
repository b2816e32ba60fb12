//! Team-scoped status pipeline: a status list plus `{event -> status}` and
//! `{round -> status}` rewrite rules. Statuses carry no global ordering.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::SchedulingError;
use super::team_config::require_team;
use crate::ids::HashKey;
use crate::store::{PipelineEvent, SelectStatusId, Tables, TeamId};

/// Status list installed on every new team, with the event each status answers to.
pub const DEFAULT_PIPELINE: [(&str, &[PipelineEvent]); 8] = [
    ("Applied", &[PipelineEvent::Imported]),
    (
        "Screening",
        &[PipelineEvent::DocumentsSubmitted, PipelineEvent::Rescheduled],
    ),
    ("Interview scheduled", &[PipelineEvent::ScheduleFilled]),
    ("Interview passed", &[PipelineEvent::InterviewPassed]),
    ("Offered", &[PipelineEvent::Offered]),
    ("Hired", &[PipelineEvent::OfferAccepted]),
    ("Declined", &[PipelineEvent::OfferDeclined]),
    ("Rejected", &[PipelineEvent::InterviewFailed]),
];

pub(crate) fn install_default_pipeline(
    tables: &mut Tables,
    team_id: TeamId,
) -> Result<(), SchedulingError> {
    let names: Vec<String> = DEFAULT_PIPELINE
        .iter()
        .map(|(name, _)| name.to_string())
        .collect();
    let ids = tables.stage_statuses(team_id, &names)?;
    for (status, (_, events)) in ids.iter().zip(DEFAULT_PIPELINE.iter()) {
        for event in events.iter() {
            tables.bind_event(team_id, *event, *status)?;
        }
    }
    Ok(())
}

/// New pipeline sent by the editor. Indexes refer to positions in `statuses`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineLayout {
    pub statuses: Vec<String>,
    /// Previous status (by hash key) to the index of its replacement.
    #[serde(default)]
    pub mapping: BTreeMap<HashKey, usize>,
    #[serde(default)]
    pub events: BTreeMap<PipelineEvent, usize>,
    #[serde(default)]
    pub rounds: BTreeMap<u8, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub hash_key: HashKey,
    pub name: String,
    pub position: u16,
}

/// Read projection of a team's pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineView {
    pub statuses: Vec<StatusView>,
    pub events: BTreeMap<PipelineEvent, HashKey>,
    pub rounds: BTreeMap<u8, HashKey>,
}

pub fn pipeline_of(tables: &Tables, team_id: TeamId) -> Result<PipelineView, SchedulingError> {
    require_team(tables, team_id)?;
    let key_of = |status: SelectStatusId| tables.status(status).map(|row| row.hash_key.clone());

    Ok(PipelineView {
        statuses: tables
            .statuses_of(team_id)
            .into_iter()
            .map(|status| StatusView {
                hash_key: status.hash_key.clone(),
                name: status.name.clone(),
                position: status.position,
            })
            .collect(),
        events: tables
            .event_bindings_of(team_id)
            .into_iter()
            .filter_map(|(event, status)| Some((event, key_of(status)?)))
            .collect(),
        rounds: tables
            .round_bindings_of(team_id)
            .into_iter()
            .filter_map(|(round, status)| Some((round, key_of(status)?)))
            .collect(),
    })
}

/// Status an event moves a team's applicants to, if the team binds it.
pub fn status_after_event(
    tables: &Tables,
    team_id: TeamId,
    event: PipelineEvent,
) -> Option<SelectStatusId> {
    tables.event_binding(team_id, event)
}

/// Status for an applicant entering `round`; the round binding wins over the
/// generic schedule-filled event.
pub fn status_for_round(tables: &Tables, team_id: TeamId, round: u8) -> Option<SelectStatusId> {
    tables
        .round_binding(team_id, round)
        .or_else(|| tables.event_binding(team_id, PipelineEvent::ScheduleFilled))
}

/// Outcome of a committed reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconfigureSummary {
    pub statuses: Vec<StatusView>,
    pub remapped_applicants: usize,
    pub retired_statuses: usize,
}

/// Replaces a team's pipeline. Runs against a transaction's working copy: any error
/// leaves the caller to drop the transaction, discarding every step.
pub fn reconfigure(
    tables: &mut Tables,
    team_id: TeamId,
    layout: &PipelineLayout,
) -> Result<ReconfigureSummary, SchedulingError> {
    let rounds = require_team(tables, team_id)?.rounds;
    let names = validate_names(&layout.statuses)?;
    let in_range = |index: &usize| *index < names.len();

    if !layout.mapping.values().all(in_range)
        || !layout.events.values().all(in_range)
        || !layout.rounds.values().all(in_range)
    {
        return Err(SchedulingError::BadInput(
            "status index is out of range".to_string(),
        ));
    }
    if let Some(round) = layout
        .rounds
        .keys()
        .find(|round| **round == 0 || **round > rounds)
    {
        return Err(SchedulingError::BadInput(format!(
            "round {round} is outside 1..={rounds}"
        )));
    }

    let mut mapping = BTreeMap::new();
    for (key, index) in &layout.mapping {
        let status = tables
            .status_by_key(team_id, key)
            .ok_or(SchedulingError::NotFound("select_status"))?;
        mapping.insert(status.id, *index);
    }

    let applicants: Vec<_> = tables
        .applicants_of_team(team_id)
        .into_iter()
        .map(|applicant| (applicant.id, applicant.status_id))
        .collect();
    if let Some((_, status)) = applicants
        .iter()
        .find(|(_, status)| !mapping.contains_key(status))
    {
        let name = tables
            .status(*status)
            .map(|row| row.name.clone())
            .unwrap_or_default();
        return Err(SchedulingError::BadInput(format!(
            "status '{name}' is still held by applicants and has no replacement"
        )));
    }

    let retired: Vec<SelectStatusId> = tables
        .statuses_of(team_id)
        .into_iter()
        .map(|status| status.id)
        .collect();
    let created = tables.stage_statuses(team_id, &names)?;

    for (applicant, status) in &applicants {
        let index = mapping[status];
        tables.set_applicant_status(*applicant, created[index])?;
    }

    tables.clear_event_bindings(team_id);
    for (event, index) in &layout.events {
        tables.bind_event(team_id, *event, created[*index])?;
    }
    tables.clear_round_bindings(team_id);
    for (round, index) in &layout.rounds {
        tables.bind_round(team_id, *round, created[*index])?;
    }

    for status in &retired {
        tables.remove_status(*status)?;
    }

    info!(
        team = team_id.0,
        statuses = created.len(),
        remapped = applicants.len(),
        retired = retired.len(),
        "pipeline reconfigured"
    );

    Ok(ReconfigureSummary {
        statuses: pipeline_of(tables, team_id)?.statuses,
        remapped_applicants: applicants.len(),
        retired_statuses: retired.len(),
    })
}

fn validate_names(statuses: &[String]) -> Result<Vec<String>, SchedulingError> {
    if statuses.is_empty() {
        return Err(SchedulingError::BadInput(
            "a pipeline needs at least one status".to_string(),
        ));
    }
    let mut seen = BTreeSet::new();
    let mut names = Vec::with_capacity(statuses.len());
    for raw in statuses {
        let name = raw.trim();
        if name.is_empty() {
            return Err(SchedulingError::BadInput(
                "status names must not be blank".to_string(),
            ));
        }
        if !seen.insert(name.to_string()) {
            return Err(SchedulingError::DuplicateName("select_status"));
        }
        names.push(name.to_string());
    }
    Ok(names)
}
