use std::collections::BTreeSet;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::availability::{on_tick_grid, TeamCalendar};
use super::calendar::ExpansionWindow;
use super::error::SchedulingError;
use super::pipeline::status_for_round;
use super::team_config::{require_team, resolve_users};
use crate::config::SchedulingConfig;
use crate::ids::HashKey;
use crate::store::{
    ApplicantId, AssignMode, Frequency, NewSchedule, SelectStatusId, Tables, Team, UserId,
};

/// Slot chosen by an applicant, confirmed by the team.
#[derive(Debug, Clone, Deserialize)]
pub struct BookingRequest {
    pub start: DateTime<FixedOffset>,
    /// Interviewers picked by hand; only accepted for manually assigned teams.
    #[serde(default)]
    pub interviewers: Option<Vec<HashKey>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Booking {
    pub applicant: HashKey,
    pub schedule: HashKey,
    pub round: u8,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub interviewers: Vec<HashKey>,
    pub status: Option<HashKey>,
}

/// Next round for an applicant, refusing when every round is already taken.
pub fn next_round(team: &Team, current: u8) -> Result<u8, SchedulingError> {
    let round = current.saturating_add(1);
    if round > team.rounds {
        return Err(SchedulingError::BadInput(format!(
            "applicant already completed all {} rounds",
            team.rounds
        )));
    }
    Ok(round)
}

/// Rejects proposals that are off the tick grid or already in the past.
pub fn validate_slot(
    start: DateTime<FixedOffset>,
    now: DateTime<Utc>,
    config: &SchedulingConfig,
) -> Result<(), SchedulingError> {
    if start.with_timezone(&Utc) <= now {
        return Err(SchedulingError::BadInput(
            "proposed start lies in the past".to_string(),
        ));
    }
    if !on_tick_grid(start, config) {
        return Err(SchedulingError::BadInput(format!(
            "proposed start must fall on a {}-minute tick within working hours",
            config.slot_minutes
        )));
    }
    Ok(())
}

/// Window wide enough to catch every interval that may overlap a booking on `date`.
pub fn booking_window(date: NaiveDate) -> ExpansionWindow {
    ExpansionWindow::new(date.pred_opt().unwrap_or(date), 3)
}

/// Orders free candidates by ascending priority; unranked users sort last by hash key.
pub fn rank_by_priority(tables: &Tables, team: &Team, candidates: &[UserId]) -> Vec<UserId> {
    let mut ranked: Vec<(u32, HashKey, UserId)> = candidates
        .iter()
        .map(|user| {
            let priority = tables.priority_of(team.id, *user).unwrap_or(u32::MAX);
            let key = tables
                .user(*user)
                .map(|row| row.hash_key.clone())
                .unwrap_or_else(|| HashKey(String::new()));
            (priority, key, *user)
        })
        .collect();
    ranked.sort();
    ranked.into_iter().map(|(_, _, user)| user).collect()
}

/// Applies the team's policy to the free eligible set.
pub fn choose_interviewers(
    tables: &Tables,
    team: &Team,
    round: u8,
    free: &[UserId],
    manual: Option<&[HashKey]>,
) -> Result<Vec<UserId>, SchedulingError> {
    let required = tables
        .round_minimum(team.id, round)
        .ok_or_else(|| SchedulingError::Internal(format!("round {round} has no staffing row")))?;

    if free.len() < usize::from(required) {
        warn!(
            team = team.id.0,
            round,
            required,
            available = free.len(),
            "round cannot be staffed"
        );
        return Err(SchedulingError::InsufficientCapacity {
            round,
            required,
            available: free.len(),
        });
    }

    match (team.assign_mode, manual) {
        (AssignMode::Auto, None) => Ok(rank_by_priority(tables, team, free)
            .into_iter()
            .take(usize::from(required))
            .collect()),
        (AssignMode::Auto, Some(_)) => Err(SchedulingError::BadInput(
            "interviewers are assigned automatically for this team".to_string(),
        )),
        (AssignMode::Manual, None) => Err(SchedulingError::BadInput(
            "this team assigns interviewers manually; supply a list".to_string(),
        )),
        (AssignMode::Manual, Some(keys)) => {
            let chosen = resolve_users(tables, team.company_id, keys)?;
            let distinct: BTreeSet<UserId> = chosen.iter().copied().collect();
            if distinct.len() != chosen.len() {
                return Err(SchedulingError::BadInput(
                    "an interviewer is listed twice".to_string(),
                ));
            }
            if chosen.len() < usize::from(required) {
                return Err(SchedulingError::BadInput(format!(
                    "round {round} needs at least {required} interviewer(s)"
                )));
            }
            if let Some(position) = chosen.iter().position(|user| !free.contains(user)) {
                warn!(team = team.id.0, round, "manual interviewer choice rejected");
                return Err(SchedulingError::ManualChoiceIneligible(keys[position].to_string()));
            }
            Ok(chosen)
        }
    }
}

/// Eligible members for `round` who are free over `[start, end)`.
pub fn free_candidates(
    tables: &Tables,
    team: &Team,
    round: u8,
    calendar: &TeamCalendar,
    start: DateTime<FixedOffset>,
    end: DateTime<FixedOffset>,
) -> Vec<UserId> {
    tables
        .eligible_users(team.id, round)
        .into_iter()
        .filter(|user| calendar.free_between(*user, start, end))
        .collect()
}

/// Books the next round for an applicant against a transaction's working copy.
pub fn book(
    tables: &mut Tables,
    applicant_id: ApplicantId,
    request: &BookingRequest,
    holidays: &BTreeSet<NaiveDate>,
    config: &SchedulingConfig,
    now: DateTime<Utc>,
) -> Result<Booking, SchedulingError> {
    let zone = config.zone.offset;
    let applicant = tables
        .applicant(applicant_id)
        .cloned()
        .ok_or(SchedulingError::NotFound("applicant"))?;
    let team = require_team(tables, applicant.team_id)?.clone();
    let round = next_round(&team, applicant.round)?;

    validate_slot(request.start, now, config)?;
    let start = request.start.with_timezone(&zone);
    let end = start + Duration::minutes(i64::from(config.booking_minutes));
    let date = start.date_naive();

    let calendar = TeamCalendar::collect(tables, team.id, &booking_window(date), zone);
    if holidays.contains(&date) || !calendar.anyone_free_at(start) {
        warn!(applicant = %applicant.hash_key, %start, "slot no longer bookable");
        return Err(SchedulingError::SlotConflict);
    }

    let free = free_candidates(tables, &team, round, &calendar, start, end);
    let chosen = choose_interviewers(
        tables,
        &team,
        round,
        &free,
        request.interviewers.as_deref(),
    )?;

    let schedule_id = tables.insert_schedule(
        NewSchedule {
            company_id: team.company_id,
            team_id: team.id,
            title: format!("Interview: {} (round {round})", applicant.name),
            frequency: Frequency::None,
            interview: true,
            start: start.with_timezone(&Utc),
            end: end.with_timezone(&Utc),
        },
        now,
    )?;
    for user in &chosen {
        tables.attach_user(schedule_id, *user)?;
    }

    let status: Option<SelectStatusId> = status_for_round(tables, team.id, round);
    if let Some(status) = status {
        tables.set_applicant_status(applicant_id, status)?;
    }
    if let Some(row) = tables.applicant_mut(applicant_id) {
        row.schedule_id = Some(schedule_id);
        row.round = round;
    }

    let schedule = tables
        .schedule(schedule_id)
        .map(|row| row.hash_key.clone())
        .ok_or_else(|| SchedulingError::Internal("booked schedule vanished".to_string()))?;
    let interviewers: Vec<HashKey> = chosen
        .iter()
        .filter_map(|user| tables.user(*user).map(|row| row.hash_key.clone()))
        .collect();

    info!(
        applicant = %applicant.hash_key,
        schedule = %schedule,
        round,
        interviewers = interviewers.len(),
        "interview booked"
    );

    Ok(Booking {
        applicant: applicant.hash_key,
        schedule,
        round,
        start,
        end,
        interviewers,
        status: status.and_then(|id| tables.status(id).map(|row| row.hash_key.clone())),
    })
}
