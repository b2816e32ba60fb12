use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::response::Response;
use axum::Router;
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::cache::{MemorySessionCache, SessionContext};
use crate::config::SchedulingConfig;
use crate::ids::HashKey;
use crate::store::{
    AssignMode, Company, Database, Frequency, NewApplicant, Schedule, Team, User,
};
use crate::workflows::interviews::{
    interview_router, FixedHolidays, HolidayError, HolidayOracle, InterviewService,
};
use crate::workflows::tenancy::{AvailabilityBlock, TeamDraft, TenancyService};

pub(super) type Service = InterviewService<FixedHolidays, MemorySessionCache>;

pub(super) fn jst() -> FixedOffset {
    FixedOffset::east_opt(9 * 3600).expect("valid offset")
}

/// Wall-clock instant in the business zone, as stored UTC.
pub(super) fn tokyo(year: i32, month: u32, day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    jst()
        .with_ymd_and_hms(year, month, day, hour, minute, 0)
        .single()
        .expect("valid local time")
        .with_timezone(&Utc)
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

/// Browse instant used by the availability scenarios.
pub(super) fn browse_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) struct Fixture {
    pub database: Arc<Database>,
    pub cache: Arc<MemorySessionCache>,
    pub tenancy: TenancyService,
    pub service: Arc<Service>,
    pub company: Company,
    pub team: Team,
    pub members: Vec<User>,
    pub session: SessionContext,
}

impl Fixture {
    pub fn member(&self, name: &str) -> &User {
        self.members
            .iter()
            .find(|user| user.name == name)
            .expect("known member")
    }

    pub fn keys(&self, names: &[&str]) -> Vec<HashKey> {
        names
            .iter()
            .map(|name| self.member(name).hash_key.clone())
            .collect()
    }

    /// Another service over the same tables, with a different holiday oracle.
    pub fn service_with<O: HolidayOracle + 'static>(
        &self,
        oracle: O,
    ) -> InterviewService<O, MemorySessionCache> {
        InterviewService::new(
            self.database.clone(),
            Arc::new(oracle),
            self.cache.clone(),
            SchedulingConfig::default(),
        )
    }

    pub fn router(&self) -> Router {
        interview_router(self.service.clone())
    }

    pub async fn applicant(&self, outer_id: &str) -> HashKey {
        let mut tx = self.database.begin().await;
        let status = tx.statuses_of(self.team.id)[0].id;
        let id = tx
            .insert_applicant(NewApplicant {
                company_id: self.company.id,
                team_id: self.team.id,
                site: "indeed".to_string(),
                outer_id: outer_id.to_string(),
                name: format!("Applicant {outer_id}"),
                email: None,
                status_id: status,
                created_at: browse_now(),
            })
            .expect("applicant inserted");
        let key = tx.applicant(id).expect("applicant").hash_key.clone();
        tx.commit();
        key
    }

    pub async fn block(
        &self,
        names: &[&str],
        frequency: Frequency,
        start: DateTime<Utc>,
        minutes: i64,
    ) -> Schedule {
        self.tenancy
            .create_schedule(
                self.company.id,
                &self.team.hash_key,
                &AvailabilityBlock {
                    title: "Busy".to_string(),
                    frequency,
                    start,
                    end: start + Duration::minutes(minutes),
                    users: self.keys(names),
                },
                start,
            )
            .await
            .expect("schedule created")
    }
}

pub(super) async fn fixture(rounds: u8, mode: AssignMode, members: &[&str]) -> Fixture {
    let database = Arc::new(Database::new());
    let cache = Arc::new(MemorySessionCache::default());
    let tenancy = TenancyService::new(database.clone(), SchedulingConfig::default());

    let company = tenancy.create_company("Acme").await.expect("company");
    let team = tenancy
        .create_team(
            company.id,
            &TeamDraft {
                name: "Platform".to_string(),
                rounds,
                assign_mode: mode,
            },
        )
        .await
        .expect("team");

    let mut users = Vec::new();
    for name in members {
        let user = tenancy
            .create_user(company.id, name, &format!("{}@acme.test", name.to_lowercase()))
            .await
            .expect("user");
        tenancy
            .add_member(company.id, &team.hash_key, &user.hash_key)
            .await
            .expect("member");
        users.push(user);
    }

    let session = SessionContext {
        user_hash_key: HashKey::from("user_recruiter"),
        company_id: company.id,
        team_id: Some(team.id),
        role_id: Some(1),
        applicant_hash_key: None,
    };
    session.store(cache.as_ref()).await.expect("session cached");

    let service = Arc::new(InterviewService::new(
        database.clone(),
        Arc::new(FixedHolidays::default()),
        cache.clone(),
        SchedulingConfig::default(),
    ));

    Fixture {
        database,
        cache,
        tenancy,
        service,
        company,
        team,
        members: users,
        session,
    }
}

/// Oracle whose upstream is always down.
pub(super) struct UnavailableHolidays;

#[async_trait]
impl HolidayOracle for UnavailableHolidays {
    async fn holidays(&self, _year: i32) -> Result<BTreeSet<NaiveDate>, HolidayError> {
        Err(HolidayError::Transport("connection refused".to_string()))
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
