//! Company, team, interviewer, and availability-schedule management.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;

use crate::cache::SessionContext;
use crate::config::SchedulingConfig;
use crate::ids::HashKey;
use crate::store::{
    AssignMode, AutoAssignRule, Company, CompanyId, Database, Frequency, NewSchedule, Schedule,
    Tables, Team, TeamId, User, UserId,
};
use crate::workflows::interviews::pipeline::install_default_pipeline;
use crate::workflows::interviews::service::commit;
use crate::workflows::interviews::team_config::{
    complete_priority, initialize_rounds, resolve_users,
};
use crate::workflows::interviews::SchedulingError;

/// Availability block an interviewer blocks out of their calendar.
#[derive(Debug, Clone, Deserialize)]
pub struct AvailabilityBlock {
    pub title: String,
    pub frequency: Frequency,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub users: Vec<HashKey>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TeamDraft {
    pub name: String,
    pub rounds: u8,
    pub assign_mode: AssignMode,
}

pub struct TenancyService {
    database: Arc<Database>,
    config: Arc<SchedulingConfig>,
}

impl TenancyService {
    pub fn new(database: Arc<Database>, config: SchedulingConfig) -> Self {
        Self {
            database,
            config: Arc::new(config),
        }
    }

    pub async fn create_company(&self, name: &str) -> Result<Company, SchedulingError> {
        let name = required(name, "company name")?;
        let mut tx = self.database.begin().await;
        let id = tx.insert_company(name)?;
        let company = tx
            .company(id)
            .cloned()
            .ok_or(SchedulingError::NotFound("company"))?;
        commit(tx)?;
        info!(company = %company.hash_key, "company created");
        Ok(company)
    }

    /// Creates a team with its per-round rows and the default status pipeline.
    pub async fn create_team(
        &self,
        company_id: CompanyId,
        draft: &TeamDraft,
    ) -> Result<Team, SchedulingError> {
        let name = required(&draft.name, "team name")?;
        if draft.rounds == 0 || draft.rounds > self.config.max_rounds {
            return Err(SchedulingError::BadInput(format!(
                "rounds must be within 1..={}",
                self.config.max_rounds
            )));
        }

        let mut tx = self.database.begin().await;
        let id = tx.insert_team(company_id, name, draft.rounds, draft.assign_mode)?;
        initialize_rounds(&mut tx, id, 1, draft.rounds)?;
        install_default_pipeline(&mut tx, id)?;
        if draft.assign_mode == AssignMode::Auto {
            tx.set_auto_rule(id, AutoAssignRule::AscByPriority)?;
        }
        let team = tx.team(id).cloned().ok_or(SchedulingError::NotFound("team"))?;
        commit(tx)?;
        info!(team = %team.hash_key, rounds = team.rounds, "team created");
        Ok(team)
    }

    pub async fn rename_team(
        &self,
        company_id: CompanyId,
        team: &HashKey,
        name: &str,
    ) -> Result<Team, SchedulingError> {
        let name = required(name, "team name")?;
        let mut tx = self.database.begin().await;
        let team_id = team_id(&tx, company_id, team)?;
        tx.ensure_team_name_free(company_id, name, Some(team_id))?;
        let renamed = {
            let row = tx.team_mut(team_id).ok_or(SchedulingError::NotFound("team"))?;
            row.name = name.to_string();
            row.clone()
        };
        commit(tx)?;
        Ok(renamed)
    }

    /// Deletes a team nothing references; the caller's active team is never deletable.
    pub async fn delete_team(
        &self,
        session: &SessionContext,
        team: &HashKey,
    ) -> Result<(), SchedulingError> {
        let mut tx = self.database.begin().await;
        let team_id = team_id(&tx, session.company_id, team)?;
        if session.team_id == Some(team_id) {
            return Err(SchedulingError::TeamInUse(
                "it is the caller's active team".to_string(),
            ));
        }
        if tx.team_in_use(team_id) {
            return Err(SchedulingError::TeamInUse(
                "applicants or schedules still reference it".to_string(),
            ));
        }
        tx.remove_team(team_id)?;
        commit(tx)?;
        info!(team = %team, "team deleted");
        Ok(())
    }

    pub async fn create_user(
        &self,
        company_id: CompanyId,
        name: &str,
        email: &str,
    ) -> Result<User, SchedulingError> {
        let name = required(name, "user name")?;
        let email = required(email, "email")?;
        if !email.contains('@') {
            return Err(SchedulingError::BadInput(format!(
                "'{email}' is not an email address"
            )));
        }
        let mut tx = self.database.begin().await;
        let id = tx.insert_user(company_id, name, email)?;
        let user = tx.user(id).cloned().ok_or(SchedulingError::NotFound("user"))?;
        commit(tx)?;
        Ok(user)
    }

    /// Adds a member, eligible for every round and ranked last in the priority list.
    pub async fn add_member(
        &self,
        company_id: CompanyId,
        team: &HashKey,
        user: &HashKey,
    ) -> Result<(), SchedulingError> {
        let mut tx = self.database.begin().await;
        let team_id = team_id(&tx, company_id, team)?;
        let user_id = user_id(&tx, company_id, user)?;
        if tx.add_membership(team_id, user_id)? {
            let rounds = tx.team(team_id).map(|row| row.rounds).unwrap_or(0);
            for round in 1..=rounds {
                tx.grant_eligibility(team_id, round, user_id)?;
            }
            let mut ordered = tx.priority_list(team_id);
            ordered.push(user_id);
            tx.replace_priorities(team_id, &ordered)?;
        }
        commit(tx)?;
        Ok(())
    }

    pub async fn remove_member(
        &self,
        company_id: CompanyId,
        team: &HashKey,
        user: &HashKey,
    ) -> Result<(), SchedulingError> {
        let mut tx = self.database.begin().await;
        let team_id = team_id(&tx, company_id, team)?;
        let user_id = user_id(&tx, company_id, user)?;
        if !tx.remove_membership(team_id, user_id) {
            return Err(SchedulingError::NotFound("team member"));
        }
        complete_priority(&mut tx, team_id)?;
        commit(tx)?;
        Ok(())
    }

    /// Records a one-shot or recurring block on the listed interviewers' calendars.
    pub async fn create_schedule(
        &self,
        company_id: CompanyId,
        team: &HashKey,
        block: &AvailabilityBlock,
        now: DateTime<Utc>,
    ) -> Result<Schedule, SchedulingError> {
        let title = required(&block.title, "schedule title")?;
        if block.end <= block.start {
            return Err(SchedulingError::BadInput(
                "schedule end must be after its start".to_string(),
            ));
        }
        let mut tx = self.database.begin().await;
        let team_id = team_id(&tx, company_id, team)?;
        let users = resolve_users(&tx, company_id, &block.users)?;
        let id = tx.insert_schedule(
            NewSchedule {
                company_id,
                team_id,
                title: title.to_string(),
                frequency: block.frequency,
                interview: false,
                start: block.start,
                end: block.end,
            },
            now,
        )?;
        for user in users {
            tx.attach_user(id, user)?;
        }
        let schedule = tx
            .schedule(id)
            .cloned()
            .ok_or(SchedulingError::NotFound("schedule"))?;
        commit(tx)?;
        Ok(schedule)
    }

    pub async fn delete_schedule(
        &self,
        company_id: CompanyId,
        schedule: &HashKey,
    ) -> Result<(), SchedulingError> {
        let mut tx = self.database.begin().await;
        let id = tx
            .schedule_by_key(company_id, schedule)
            .map(|row| row.id)
            .ok_or(SchedulingError::NotFound("schedule"))?;
        tx.remove_schedule(id)?;
        commit(tx)?;
        Ok(())
    }
}

fn required<'a>(value: &'a str, what: &str) -> Result<&'a str, SchedulingError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SchedulingError::BadInput(format!("{what} must not be blank")));
    }
    Ok(trimmed)
}

pub(crate) fn team_id(
    tables: &Tables,
    company_id: CompanyId,
    key: &HashKey,
) -> Result<TeamId, SchedulingError> {
    tables
        .team_by_key(company_id, key)
        .map(|team| team.id)
        .ok_or(SchedulingError::NotFound("team"))
}

fn user_id(tables: &Tables, company_id: CompanyId, key: &HashKey) -> Result<UserId, SchedulingError> {
    tables
        .user_by_key(company_id, key)
        .map(|user| user.id)
        .ok_or(SchedulingError::NotFound("user"))
}
