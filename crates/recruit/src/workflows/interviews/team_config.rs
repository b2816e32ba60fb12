use serde::{Deserialize, Serialize};
use tracing::info;

use super::error::SchedulingError;
use crate::ids::HashKey;
use crate::store::{AssignMode, AutoAssignRule, CompanyId, Tables, Team, TeamId, UserId};

/// Staffing rules of one interview round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundSettings {
    pub round: u8,
    pub user_min: u8,
    pub eligible: Vec<HashKey>,
}

/// Joined read projection of a team's interview configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TeamSettings {
    pub hash_key: HashKey,
    pub name: String,
    pub rounds: u8,
    pub assign_mode: AssignMode,
    pub auto_rule: Option<AutoAssignRule>,
    pub members: Vec<HashKey>,
    pub priority: Vec<HashKey>,
    pub per_round: Vec<RoundSettings>,
}

/// Assignment rule selector as sent by the settings editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AssignRuleUpdate {
    pub mode: AssignMode,
    #[serde(default)]
    pub auto_rule: Option<AutoAssignRule>,
}

pub(crate) fn require_team(tables: &Tables, team_id: TeamId) -> Result<&Team, SchedulingError> {
    tables.team(team_id).ok_or(SchedulingError::NotFound("team"))
}

/// Resolves public user keys inside one tenant.
pub(crate) fn resolve_users(
    tables: &Tables,
    company_id: CompanyId,
    keys: &[HashKey],
) -> Result<Vec<UserId>, SchedulingError> {
    keys.iter()
        .map(|key| {
            tables
                .user_by_key(company_id, key)
                .map(|user| user.id)
                .ok_or(SchedulingError::NotFound("user"))
        })
        .collect()
}

fn user_keys(tables: &Tables, users: &[UserId]) -> Vec<HashKey> {
    users
        .iter()
        .filter_map(|user| tables.user(*user).map(|row| row.hash_key.clone()))
        .collect()
}

pub fn team_settings(tables: &Tables, team_id: TeamId) -> Result<TeamSettings, SchedulingError> {
    let team = require_team(tables, team_id)?;
    let per_round = tables
        .round_minimums_of(team_id)
        .into_iter()
        .map(|(round, user_min)| RoundSettings {
            round,
            user_min,
            eligible: user_keys(tables, &tables.eligible_users(team_id, round)),
        })
        .collect();

    Ok(TeamSettings {
        hash_key: team.hash_key.clone(),
        name: team.name.clone(),
        rounds: team.rounds,
        assign_mode: team.assign_mode,
        auto_rule: tables.auto_rule(team_id),
        members: user_keys(tables, &tables.members(team_id)),
        priority: user_keys(tables, &tables.priority_list(team_id)),
        per_round,
    })
}

fn check_rounds(rounds: u8, max_rounds: u8) -> Result<(), SchedulingError> {
    if rounds == 0 || rounds > max_rounds {
        return Err(SchedulingError::BadInput(format!(
            "rounds must be within 1..={max_rounds}"
        )));
    }
    Ok(())
}

fn check_round(team: &Team, round: u8) -> Result<(), SchedulingError> {
    if round == 0 || round > team.rounds {
        return Err(SchedulingError::BadInput(format!(
            "round {round} is outside 1..={}",
            team.rounds
        )));
    }
    Ok(())
}

/// Creates the per-round rows of a freshly created team: `userMin = 1` and every member eligible.
pub(crate) fn initialize_rounds(
    tables: &mut Tables,
    team_id: TeamId,
    from: u8,
    to: u8,
) -> Result<(), SchedulingError> {
    let members = tables.members(team_id);
    for round in from..=to {
        tables.set_round_minimum(team_id, round, 1)?;
        for user in &members {
            tables.grant_eligibility(team_id, round, *user)?;
        }
    }
    Ok(())
}

/// Changes the number of rounds. New rounds get `userMin = 1` with every member
/// eligible; rounds beyond the new count lose all their rows.
pub fn update_rounds(
    tables: &mut Tables,
    team_id: TeamId,
    rounds: u8,
    max_rounds: u8,
) -> Result<(), SchedulingError> {
    check_rounds(rounds, max_rounds)?;
    let previous = require_team(tables, team_id)?.rounds;

    if rounds > previous {
        initialize_rounds(tables, team_id, previous + 1, rounds)?;
    } else if rounds < previous {
        tables.truncate_rounds(team_id, rounds);
    }
    if let Some(team) = tables.team_mut(team_id) {
        team.rounds = rounds;
    }

    info!(team = team_id.0, previous, rounds, "team rounds updated");
    Ok(())
}

pub fn set_round_minimum(
    tables: &mut Tables,
    team_id: TeamId,
    round: u8,
    user_min: u8,
    max_headcount: u8,
) -> Result<(), SchedulingError> {
    check_round(require_team(tables, team_id)?, round)?;
    if user_min == 0 || user_min > max_headcount {
        return Err(SchedulingError::BadInput(format!(
            "minimum headcount must be within 1..={max_headcount}"
        )));
    }
    tables.set_round_minimum(team_id, round, user_min)?;
    Ok(())
}

/// Replaces the eligible interviewers of one round. Every user must be a team member.
pub fn replace_eligibility(
    tables: &mut Tables,
    team_id: TeamId,
    round: u8,
    users: &[UserId],
) -> Result<(), SchedulingError> {
    check_round(require_team(tables, team_id)?, round)?;
    if users.iter().any(|user| !tables.is_member(team_id, *user)) {
        return Err(SchedulingError::BadInput(
            "eligible interviewers must be team members".to_string(),
        ));
    }
    tables.clear_eligibility(team_id, round);
    for user in users {
        tables.grant_eligibility(team_id, round, *user)?;
    }
    Ok(())
}

/// Replaces the priority list; it must order every team member exactly once.
pub fn replace_priority(
    tables: &mut Tables,
    team_id: TeamId,
    ordered: &[UserId],
) -> Result<(), SchedulingError> {
    require_team(tables, team_id)?;
    let mut given = ordered.to_vec();
    given.sort();
    let before = given.len();
    given.dedup();
    if given.len() != before {
        return Err(SchedulingError::BadInput(
            "priority list names a user twice".to_string(),
        ));
    }
    if given != tables.members(team_id) {
        return Err(SchedulingError::BadInput(
            "priority list must order every team member exactly once".to_string(),
        ));
    }
    tables.replace_priorities(team_id, ordered)?;
    Ok(())
}

/// Selects the assignment policy. Switching to automatic assignment completes the
/// priority list with any unranked members, ordered by hash key.
pub fn set_assign_rule(
    tables: &mut Tables,
    team_id: TeamId,
    update: AssignRuleUpdate,
) -> Result<(), SchedulingError> {
    require_team(tables, team_id)?;
    if update.mode == AssignMode::Auto {
        let rule = update.auto_rule.unwrap_or(AutoAssignRule::AscByPriority);
        tables.set_auto_rule(team_id, rule)?;
        complete_priority(tables, team_id)?;
    } else if let Some(rule) = update.auto_rule {
        tables.set_auto_rule(team_id, rule)?;
    }
    if let Some(team) = tables.team_mut(team_id) {
        team.assign_mode = update.mode;
    }
    Ok(())
}

/// Appends unranked members to the priority list, ordered by hash key.
pub(crate) fn complete_priority(tables: &mut Tables, team_id: TeamId) -> Result<(), SchedulingError> {
    let mut ordered = tables.priority_list(team_id);
    let mut unranked: Vec<(HashKey, UserId)> = tables
        .members(team_id)
        .into_iter()
        .filter(|user| !ordered.contains(user))
        .filter_map(|user| tables.user(user).map(|row| (row.hash_key.clone(), user)))
        .collect();
    if unranked.is_empty() {
        return Ok(());
    }
    unranked.sort();
    ordered.extend(unranked.into_iter().map(|(_, user)| user));
    tables.replace_priorities(team_id, &ordered)?;
    Ok(())
}
