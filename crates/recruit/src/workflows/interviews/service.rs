use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use tracing::{info, instrument};

use super::assignment::{self, Booking, BookingRequest};
use super::availability::{self, browse_window, AvailabilityGrid};
use super::error::SchedulingError;
use super::holidays::{holidays_between, HolidayOracle};
use super::pipeline::{self, PipelineLayout, PipelineView, ReconfigureSummary};
use super::rollover::{self, RolloverOutcome};
use super::team_config::{self, resolve_users, AssignRuleUpdate, TeamSettings};
use super::transition::{self, Transition};
use crate::cache::{SessionCache, SessionContext};
use crate::config::{RolloverPolicy, SchedulingConfig};
use crate::ids::HashKey;
use crate::store::{ApplicantId, CompanyId, Database, PipelineEvent, Tables, TeamId, Transaction};

/// Entry point for availability, booking, pipeline, and team-settings operations.
pub struct InterviewService<O, C> {
    database: Arc<Database>,
    holidays: Arc<O>,
    cache: Arc<C>,
    config: Arc<SchedulingConfig>,
}

impl<O, C> InterviewService<O, C>
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    pub fn new(
        database: Arc<Database>,
        holidays: Arc<O>,
        cache: Arc<C>,
        config: SchedulingConfig,
    ) -> Self {
        Self {
            database,
            holidays,
            cache,
            config: Arc::new(config),
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn config(&self) -> &SchedulingConfig {
        &self.config
    }

    /// Resolves the caller's session from the cache.
    pub async fn session(&self, user_hash_key: &str) -> Result<SessionContext, SchedulingError> {
        Ok(SessionContext::resolve(self.cache.as_ref(), user_hash_key).await?)
    }

    /// Reservable grid for an applicant of the caller's tenant.
    #[instrument(skip(self), fields(company = company_id.0))]
    pub async fn availability(
        &self,
        company_id: CompanyId,
        applicant: &HashKey,
        now: DateTime<Utc>,
    ) -> Result<AvailabilityGrid, SchedulingError> {
        let window = browse_window(now, &self.config);
        let holidays = holidays_between(self.holidays.as_ref(), window.first, window.end).await?;

        let inputs = {
            let tables = self.database.read().await;
            let applicant = tables
                .applicant_by_key(company_id, applicant)
                .ok_or(SchedulingError::NotFound("applicant"))?;
            availability::gather(&tables, applicant, &window, &self.config)?
        };

        Ok(availability::assemble(
            inputs,
            &window,
            &holidays,
            &self.config,
        ))
    }

    /// Confirms a slot for the applicant's next round and assigns interviewers.
    #[instrument(skip(self, session, request), fields(company = session.company_id.0))]
    pub async fn book(
        &self,
        session: &SessionContext,
        applicant: &HashKey,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, SchedulingError> {
        let team_id = active_team(session)?;
        let year = request.start.with_timezone(&self.config.zone.offset).year();
        let holidays = self.holidays.holidays(year).await?;

        let mut tx = self.database.begin().await;
        require_own_team(&tx, session, team_id)?;
        let applicant_id = team_applicant(&tx, session.company_id, team_id, applicant)?;
        let booking = assignment::book(
            &mut tx,
            applicant_id,
            &request,
            &holidays,
            &self.config,
            now,
        )?;
        commit(tx)?;
        Ok(booking)
    }

    pub async fn apply_event(
        &self,
        session: &SessionContext,
        applicant: &HashKey,
        event: PipelineEvent,
    ) -> Result<Transition, SchedulingError> {
        let team_id = active_team(session)?;
        let mut tx = self.database.begin().await;
        require_own_team(&tx, session, team_id)?;
        let applicant_id = tx
            .applicant_by_key(session.company_id, applicant)
            .map(|row| row.id)
            .ok_or(SchedulingError::NotFound("applicant"))?;
        let transition = transition::apply_event(&mut tx, team_id, applicant_id, event)?;
        commit(tx)?;
        Ok(transition)
    }

    pub async fn pipeline(&self, session: &SessionContext) -> Result<PipelineView, SchedulingError> {
        let team_id = active_team(session)?;
        let tables = self.database.read().await;
        require_own_team(&tables, session, team_id)?;
        pipeline::pipeline_of(&tables, team_id)
    }

    /// Replaces statuses and bindings of the caller's team in one transaction.
    pub async fn reconfigure_pipeline(
        &self,
        session: &SessionContext,
        layout: &PipelineLayout,
    ) -> Result<ReconfigureSummary, SchedulingError> {
        let team_id = active_team(session)?;
        let mut tx = self.database.begin().await;
        require_own_team(&tx, session, team_id)?;
        let summary = pipeline::reconfigure(&mut tx, team_id, layout)?;
        commit(tx)?;
        Ok(summary)
    }

    pub async fn team_settings(
        &self,
        session: &SessionContext,
    ) -> Result<TeamSettings, SchedulingError> {
        let team_id = active_team(session)?;
        let tables = self.database.read().await;
        require_own_team(&tables, session, team_id)?;
        team_config::team_settings(&tables, team_id)
    }

    pub async fn update_rounds(
        &self,
        session: &SessionContext,
        rounds: u8,
    ) -> Result<TeamSettings, SchedulingError> {
        let max_rounds = self.config.max_rounds;
        self.edit_team(session, move |tables, team_id| {
            team_config::update_rounds(tables, team_id, rounds, max_rounds)
        })
        .await
    }

    pub async fn set_round_minimum(
        &self,
        session: &SessionContext,
        round: u8,
        user_min: u8,
    ) -> Result<TeamSettings, SchedulingError> {
        let max_headcount = self.config.max_headcount;
        self.edit_team(session, move |tables, team_id| {
            team_config::set_round_minimum(tables, team_id, round, user_min, max_headcount)
        })
        .await
    }

    pub async fn replace_eligibility(
        &self,
        session: &SessionContext,
        round: u8,
        users: &[HashKey],
    ) -> Result<TeamSettings, SchedulingError> {
        let company_id = session.company_id;
        self.edit_team(session, move |tables, team_id| {
            let users = resolve_users(tables, company_id, users)?;
            team_config::replace_eligibility(tables, team_id, round, &users)
        })
        .await
    }

    pub async fn replace_priority(
        &self,
        session: &SessionContext,
        users: &[HashKey],
    ) -> Result<TeamSettings, SchedulingError> {
        let company_id = session.company_id;
        self.edit_team(session, move |tables, team_id| {
            let users = resolve_users(tables, company_id, users)?;
            team_config::replace_priority(tables, team_id, &users)
        })
        .await
    }

    pub async fn set_assign_rule(
        &self,
        session: &SessionContext,
        update: AssignRuleUpdate,
    ) -> Result<TeamSettings, SchedulingError> {
        self.edit_team(session, move |tables, team_id| {
            team_config::set_assign_rule(tables, team_id, update)
        })
        .await
    }

    /// One sweep over every tenant's schedules.
    pub async fn rollover(
        &self,
        now: DateTime<Utc>,
        policy: RolloverPolicy,
    ) -> Result<RolloverOutcome, SchedulingError> {
        let mut tx = self.database.begin().await;
        let outcome = rollover::sweep(&mut tx, now, self.config.zone.offset, policy)?;
        commit(tx)?;
        Ok(outcome)
    }

    async fn edit_team<F>(
        &self,
        session: &SessionContext,
        edit: F,
    ) -> Result<TeamSettings, SchedulingError>
    where
        F: FnOnce(&mut Tables, TeamId) -> Result<(), SchedulingError>,
    {
        let team_id = active_team(session)?;
        let mut tx = self.database.begin().await;
        require_own_team(&tx, session, team_id)?;
        edit(&mut *tx, team_id)?;
        let settings = team_config::team_settings(&tx, team_id)?;
        commit(tx)?;
        info!(team = %settings.hash_key, "team settings updated");
        Ok(settings)
    }
}

fn active_team(session: &SessionContext) -> Result<TeamId, SchedulingError> {
    session.team_id.ok_or(SchedulingError::NotFound("team"))
}

/// The session's team must belong to the session's company.
fn require_own_team(
    tables: &Tables,
    session: &SessionContext,
    team_id: TeamId,
) -> Result<(), SchedulingError> {
    match tables.team(team_id) {
        Some(team) if team.company_id == session.company_id => Ok(()),
        _ => Err(SchedulingError::NotFound("team")),
    }
}

fn team_applicant(
    tables: &Tables,
    company_id: CompanyId,
    team_id: TeamId,
    key: &HashKey,
) -> Result<ApplicantId, SchedulingError> {
    tables
        .applicant_by_key(company_id, key)
        .filter(|applicant| applicant.team_id == team_id)
        .map(|applicant| applicant.id)
        .ok_or(SchedulingError::NotFound("applicant"))
}

/// Publishes a transaction once the cross-table invariants hold; otherwise it rolls back.
pub(crate) fn commit(tx: Transaction<'_>) -> Result<(), SchedulingError> {
    tx.check_invariants().map_err(SchedulingError::Internal)?;
    tx.commit();
    Ok(())
}
