use crate::routes::ApplicantApi;
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use recruit::cache::MemorySessionCache;
use recruit::config::AppConfig;
use recruit::error::AppError;
use recruit::store::Database;
use recruit::workflows::applicants::{ApplicantService, ConfiguredStorage, HttpCalendarProvider};
use recruit::workflows::interviews::{
    HolidayFeed, InterviewService, MemoizedHolidays, SchedulingError,
};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type LiveHolidays = MemoizedHolidays<HolidayFeed>;
pub(crate) type LiveInterviews = InterviewService<LiveHolidays, MemorySessionCache>;

/// Services sharing one in-process database and session cache.
pub(crate) struct Services {
    pub(crate) interviews: Arc<LiveInterviews>,
    pub(crate) applicants: ApplicantApi<ConfiguredStorage, HttpCalendarProvider, MemorySessionCache>,
}

pub(crate) async fn build_services(config: &AppConfig) -> Result<Services, AppError> {
    let database = Arc::new(Database::new());
    let cache = Arc::new(MemorySessionCache::new(config.cache.ttl_hours));
    let feed = HolidayFeed::new(config.integrations.holiday_feed_url.clone())
        .map_err(SchedulingError::from)?;
    let calendar = HttpCalendarProvider::new(config.integrations.calendar_api_url.clone())
        .map_err(SchedulingError::from)?;
    let documents = ConfiguredStorage::open(&config.integrations.documents)
        .await
        .map_err(SchedulingError::from)?;

    let interviews = Arc::new(InterviewService::new(
        database.clone(),
        Arc::new(MemoizedHolidays::new(feed)),
        cache.clone(),
        config.scheduling.clone(),
    ));
    let applicants = ApplicantApi {
        applicants: Arc::new(ApplicantService::new(
            database.clone(),
            Arc::new(documents),
            Arc::new(calendar),
            cache.clone(),
        )),
        database,
        cache,
    };

    Ok(Services {
        interviews,
        applicants,
    })
}

pub(crate) fn parse_instant(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|err| format!("failed to parse '{raw}' as an RFC 3339 instant ({err})"))
}
