//! End-to-end recruiting flows through the public services: board import, document
//! exchange, booking, meeting links, rollover, and team lifecycle.

mod common {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, FixedOffset, TimeZone, Utc};

    use recruit::cache::{MemorySessionCache, SessionContext};
    use recruit::config::SchedulingConfig;
    use recruit::store::{AssignMode, Company, Database, Team, User};
    use recruit::workflows::applicants::{
        ApplicantService, CalendarError, CalendarProvider, MemoryDocumentStorage,
    };
    use recruit::workflows::interviews::{FixedHolidays, InterviewService};
    use recruit::workflows::tenancy::{TeamDraft, TenancyService};

    pub(super) fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("valid offset")
    }

    pub(super) fn tokyo(year: i32, month: u32, day: u32, hour: u32) -> DateTime<FixedOffset> {
        jst()
            .with_ymd_and_hms(year, month, day, hour, 0, 0)
            .single()
            .expect("valid local time")
    }

    pub(super) fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0)
            .single()
            .expect("valid instant")
    }

    #[derive(Debug, Default)]
    pub(super) struct RecordingCalendar {
        pub calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl CalendarProvider for RecordingCalendar {
        async fn issue_meeting_url(
            &self,
            token: &str,
            title: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<String, CalendarError> {
            self.calls
                .lock()
                .expect("calls lock")
                .push((token.to_string(), title.to_string()));
            Ok("https://meet.example.test/abc-defg-hij".to_string())
        }
    }

    pub(super) struct Harness {
        pub database: Arc<Database>,
        pub cache: Arc<MemorySessionCache>,
        pub storage: Arc<MemoryDocumentStorage>,
        pub calendar: Arc<RecordingCalendar>,
        pub tenancy: TenancyService,
        pub interviews: InterviewService<FixedHolidays, MemorySessionCache>,
        pub applicants: ApplicantService<MemoryDocumentStorage, RecordingCalendar, MemorySessionCache>,
        pub company: Company,
        pub team: Team,
        pub recruiter: User,
        pub session: SessionContext,
    }

    pub(super) async fn harness() -> Harness {
        let database = Arc::new(Database::new());
        let cache = Arc::new(MemorySessionCache::default());
        let storage = Arc::new(MemoryDocumentStorage::default());
        let calendar = Arc::new(RecordingCalendar::default());
        let config = SchedulingConfig::default();

        let tenancy = TenancyService::new(database.clone(), config.clone());
        let company = tenancy.create_company("Acme").await.expect("company");
        let team = tenancy
            .create_team(
                company.id,
                &TeamDraft {
                    name: "Platform".to_string(),
                    rounds: 2,
                    assign_mode: AssignMode::Auto,
                },
            )
            .await
            .expect("team");
        let recruiter = tenancy
            .create_user(company.id, "Kana", "kana@acme.test")
            .await
            .expect("user");
        tenancy
            .add_member(company.id, &team.hash_key, &recruiter.hash_key)
            .await
            .expect("member");

        let session = SessionContext {
            user_hash_key: recruiter.hash_key.clone(),
            company_id: company.id,
            team_id: Some(team.id),
            role_id: Some(1),
            applicant_hash_key: None,
        };
        session.store(cache.as_ref()).await.expect("session");

        let interviews = InterviewService::new(
            database.clone(),
            Arc::new(FixedHolidays::default()),
            cache.clone(),
            config,
        );
        let applicants = ApplicantService::new(
            database.clone(),
            storage.clone(),
            calendar.clone(),
            cache.clone(),
        );

        Harness {
            database,
            cache,
            storage,
            calendar,
            tenancy,
            interviews,
            applicants,
            company,
            team,
            recruiter,
            session,
        }
    }
}

use common::*;

use recruit::cache::{CacheField, SessionCache};
use recruit::config::RolloverPolicy;
use recruit::ids::HashKey;
use recruit::workflows::applicants::{parse_board_export, DocumentKind};
use recruit::workflows::interviews::{BookingRequest, SchedulingError};

const EXPORT: &str = "Site,Outer ID,Name,Email\n\
indeed,IN-100,Haruto Sato,Haruto@Example.test\n\
indeed,IN-101,Yui Suzuki,\n";

async fn imported_applicant(harness: &Harness, outer_id: &str) -> HashKey {
    harness
        .database
        .read()
        .await
        .find_applicant(harness.team.id, "indeed", outer_id)
        .map(|applicant| applicant.hash_key.clone())
        .expect("imported applicant")
}

async fn status_name(harness: &Harness, applicant: &HashKey) -> String {
    let tables = harness.database.read().await;
    let row = tables
        .applicant_by_key(harness.company.id, applicant)
        .expect("applicant");
    tables.status(row.status_id).expect("status").name.clone()
}

#[tokio::test]
async fn board_import_upserts_applicants() {
    let harness = harness().await;
    let records = parse_board_export(EXPORT.as_bytes()).expect("parsed");

    let first = harness
        .applicants
        .import(harness.company.id, &harness.team.hash_key, &records, now())
        .await
        .expect("imported");
    assert_eq!((first.created, first.updated), (2, 0));

    let again = harness
        .applicants
        .import(harness.company.id, &harness.team.hash_key, &records, now())
        .await
        .expect("re-imported");
    assert_eq!((again.created, again.updated), (0, 2));

    let applicant = imported_applicant(&harness, "IN-100").await;
    assert_eq!(status_name(&harness, &applicant).await, "Applied");
    let tables = harness.database.read().await;
    let row = tables
        .applicant_by_key(harness.company.id, &applicant)
        .expect("applicant");
    assert_eq!(row.email.as_deref(), Some("haruto@example.test"));
    assert_eq!(row.round, 0);
}

#[tokio::test]
async fn documents_move_applicants_into_screening() {
    let harness = harness().await;
    let records = parse_board_export(EXPORT.as_bytes()).expect("parsed");
    harness
        .applicants
        .import(harness.company.id, &harness.team.hash_key, &records, now())
        .await
        .expect("imported");
    let applicant = imported_applicant(&harness, "IN-101").await;

    let key = harness
        .applicants
        .upload_document(
            harness.company.id,
            &applicant,
            DocumentKind::Resume,
            ".PDF",
            b"%PDF-1.7".to_vec(),
            Some("application/pdf".to_string()),
        )
        .await
        .expect("uploaded");

    assert_eq!(key, format!("resume_{applicant}.pdf"));
    assert_eq!(status_name(&harness, &applicant).await, "Screening");
    let stored = harness.storage.stored(&key).await.expect("stored");
    assert_eq!(stored.content_type.as_deref(), Some("application/pdf"));

    let bytes = harness
        .applicants
        .download_document(harness.company.id, &applicant, DocumentKind::Resume)
        .await
        .expect("downloaded");
    assert_eq!(bytes, b"%PDF-1.7");

    match harness
        .applicants
        .download_document(harness.company.id, &applicant, DocumentKind::CurriculumVitae)
        .await
    {
        Err(SchedulingError::NotFound("document")) => {}
        other => panic!("expected missing document, got {other:?}"),
    }
}

#[tokio::test]
async fn booked_interview_gets_a_meeting_link_and_expires() {
    let harness = harness().await;
    let records = parse_board_export(EXPORT.as_bytes()).expect("parsed");
    harness
        .applicants
        .import(harness.company.id, &harness.team.hash_key, &records, now())
        .await
        .expect("imported");
    let applicant = imported_applicant(&harness, "IN-100").await;

    let grid = harness
        .interviews
        .availability(harness.company.id, &applicant, now())
        .await
        .expect("grid");
    let slot = grid
        .options
        .iter()
        .find(|option| option.reservable && option.start == tokyo(2025, 3, 10, 12))
        .expect("monday noon is open");

    let booking = harness
        .interviews
        .book(
            &harness.session,
            &applicant,
            BookingRequest {
                start: slot.start,
                interviewers: None,
            },
            now(),
        )
        .await
        .expect("booked");
    assert_eq!(booking.interviewers, vec![harness.recruiter.hash_key.clone()]);
    assert_eq!(status_name(&harness, &applicant).await, "Interview scheduled");

    match harness
        .applicants
        .publish_meeting_url(&harness.session, &applicant)
        .await
    {
        Err(SchedulingError::BadInput(_)) => {}
        other => panic!("expected missing calendar token, got {other:?}"),
    }

    harness
        .cache
        .set(
            harness.recruiter.hash_key.as_str(),
            CacheField::OauthRefreshToken,
            "refresh-token".to_string(),
        )
        .await
        .expect("token cached");
    let url = harness
        .applicants
        .publish_meeting_url(&harness.session, &applicant)
        .await
        .expect("meeting link");
    assert!(url.starts_with("https://meet.example.test/"));
    {
        let calls = harness.calendar.calls.lock().expect("calls lock");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "refresh-token");
        assert!(calls[0].1.contains("Haruto Sato"));
    }

    let swept = harness
        .interviews
        .rollover(
            tokyo(2025, 3, 11, 0).with_timezone(&chrono::Utc),
            RolloverPolicy::SinglePeriod,
        )
        .await
        .expect("rollover");
    assert_eq!(swept.deleted, 1);

    let tables = harness.database.read().await;
    let row = tables
        .applicant_by_key(harness.company.id, &applicant)
        .expect("applicant");
    assert_eq!(row.schedule_id, None);
    assert_eq!(row.meet_url.as_deref(), Some(url.as_str()));
}

#[tokio::test]
async fn teams_in_use_cannot_be_deleted() {
    let harness = harness().await;
    let records = parse_board_export(EXPORT.as_bytes()).expect("parsed");
    harness
        .applicants
        .import(harness.company.id, &harness.team.hash_key, &records, now())
        .await
        .expect("imported");

    match harness
        .tenancy
        .delete_team(&harness.session, &harness.team.hash_key)
        .await
    {
        Err(SchedulingError::TeamInUse(_)) => {}
        other => panic!("expected team in use, got {other:?}"),
    }

    let elsewhere = recruit::cache::SessionContext {
        team_id: None,
        ..harness.session.clone()
    };
    match harness
        .tenancy
        .delete_team(&elsewhere, &harness.team.hash_key)
        .await
    {
        Err(SchedulingError::TeamInUse(_)) => {}
        other => panic!("expected team in use, got {other:?}"),
    }
}
