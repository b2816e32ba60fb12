use async_trait::async_trait;
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, TimeZone, Utc};
use clap::Args;
use recruit::cache::{CacheField, MemorySessionCache, SessionCache, SessionContext};
use recruit::config::{AppConfig, RolloverPolicy, SchedulingConfig};
use recruit::error::AppError;
use recruit::ids::HashKey;
use recruit::store::{AssignMode, Company, Database, Frequency, Team, User};
use recruit::workflows::applicants::{
    parse_board_export, ApplicantService, BoardRecord, CalendarError, CalendarProvider,
    DocumentKind, MemoryDocumentStorage,
};
use recruit::workflows::interviews::{
    AvailabilityGrid, BookingRequest, FixedHolidays, InterviewService, SchedulingError,
};
use recruit::workflows::tenancy::{AvailabilityBlock, TeamDraft, TenancyService};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const SAMPLE_EXPORT: &str = "Site,Outer ID,Name,Email\n\
indeed,IN-2041,Haruto Sato,haruto.sato@example.test\n\
indeed,IN-2042,Yui Suzuki,yui.suzuki@example.test\n\
wantedly,WT-311,Sora Tanaka,\n";

const INTERVIEWERS: [(&str, &str); 3] = [
    ("Aoi", "aoi@acme-recruiting.test"),
    ("Ren", "ren@acme-recruiting.test"),
    ("Mei", "mei@acme-recruiting.test"),
];

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Instant the demo treats as "now" (RFC 3339). Defaults to the current time.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Job-board CSV export to import instead of the built-in sample.
    #[arg(long)]
    pub(crate) csv: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RolloverArgs {
    /// Sweep instant (RFC 3339). Defaults to the current time.
    #[arg(long, value_parser = crate::infra::parse_instant)]
    pub(crate) now: Option<DateTime<Utc>>,
    /// Advance elapsed anchors until they reach the sweep instant.
    #[arg(long)]
    pub(crate) catch_up: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ImportArgs {
    /// Job-board CSV export with Site, Outer ID, Name, Email columns
    #[arg(long)]
    pub(crate) csv: PathBuf,
    /// Directory of resumes named `<outer id>.<extension>`
    #[arg(long)]
    pub(crate) documents: Option<PathBuf>,
    /// Company to create for the import
    #[arg(long, default_value = "Acme Recruiting")]
    pub(crate) company: String,
    /// Team receiving the applicants
    #[arg(long, default_value = "Platform")]
    pub(crate) team: String,
}

/// Calendar that answers without leaving the process.
#[derive(Debug, Default)]
struct OfflineCalendar;

#[async_trait]
impl CalendarProvider for OfflineCalendar {
    async fn issue_meeting_url(
        &self,
        _token: &str,
        _title: &str,
        start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<String, CalendarError> {
        Ok(format!(
            "https://meet.example.test/demo-{}",
            start.format("%Y%m%d%H%M")
        ))
    }
}

type DemoInterviews = InterviewService<FixedHolidays, MemorySessionCache>;
type DemoApplicants = ApplicantService<MemoryDocumentStorage, OfflineCalendar, MemorySessionCache>;

/// One company with an auto-assigned team, three interviewers, and their blocked time.
struct DemoTenant {
    zone: FixedOffset,
    database: Arc<Database>,
    cache: Arc<MemorySessionCache>,
    interviews: DemoInterviews,
    applicants: DemoApplicants,
    company: Company,
    team: Team,
    interviewers: Vec<User>,
    session: SessionContext,
}

/// Rows of the demo tenant plus the cached session of its first interviewer.
pub(crate) struct SeededTenant {
    pub(crate) company: Company,
    pub(crate) team: Team,
    pub(crate) interviewers: Vec<User>,
    pub(crate) session: SessionContext,
}

/// Seeds one company with blocks anchored on `anchor` (a business-zone date):
/// a weekly afternoon block for Aoi, a daily lunch for Ren, a one-shot for Mei.
pub(crate) async fn seed_rows<C>(
    database: Arc<Database>,
    cache: &C,
    config: &SchedulingConfig,
    anchor: NaiveDate,
    now: DateTime<Utc>,
) -> Result<SeededTenant, SchedulingError>
where
    C: SessionCache,
{
    let zone = config.zone.offset;
    let tenancy = TenancyService::new(database, config.clone());

    let company = tenancy.create_company("Acme Recruiting").await?;
    let team = tenancy
        .create_team(
            company.id,
            &TeamDraft {
                name: "Platform".to_string(),
                rounds: 2,
                assign_mode: AssignMode::Auto,
            },
        )
        .await?;

    let mut interviewers = Vec::with_capacity(INTERVIEWERS.len());
    for (name, email) in INTERVIEWERS {
        let user = tenancy.create_user(company.id, name, email).await?;
        tenancy
            .add_member(company.id, &team.hash_key, &user.hash_key)
            .await?;
        interviewers.push(user);
    }

    let blocks = [
        ("Architecture review", Frequency::Weekly, 0, 13, 120, 0),
        ("Lunch", Frequency::Daily, 0, 12, 60, 1),
        ("Offsite", Frequency::None, 8, 10, 180, 2),
    ];
    for (title, frequency, day_offset, hour, minutes, owner) in blocks {
        let day = anchor + Duration::days(day_offset);
        let start = wall_clock(zone, day, hour)?;
        tenancy
            .create_schedule(
                company.id,
                &team.hash_key,
                &AvailabilityBlock {
                    title: title.to_string(),
                    frequency,
                    start,
                    end: start + Duration::minutes(minutes),
                    users: vec![interviewers[owner].hash_key.clone()],
                },
                now,
            )
            .await?;
    }

    let session = SessionContext {
        user_hash_key: interviewers[0].hash_key.clone(),
        company_id: company.id,
        team_id: Some(team.id),
        role_id: Some(1),
        applicant_hash_key: None,
    };
    session.store(cache).await?;

    Ok(SeededTenant {
        company,
        team,
        interviewers,
        session,
    })
}

async fn seed_tenant(
    config: &SchedulingConfig,
    anchor: NaiveDate,
    now: DateTime<Utc>,
) -> Result<DemoTenant, SchedulingError> {
    let database = Arc::new(Database::new());
    let cache = Arc::new(MemorySessionCache::default());
    let seeded = seed_rows(database.clone(), cache.as_ref(), config, anchor, now).await?;

    let interviews = InterviewService::new(
        database.clone(),
        Arc::new(FixedHolidays::default()),
        cache.clone(),
        config.clone(),
    );
    let applicants = ApplicantService::new(
        database.clone(),
        Arc::new(MemoryDocumentStorage::default()),
        Arc::new(OfflineCalendar),
        cache.clone(),
    );

    Ok(DemoTenant {
        zone: config.zone.offset,
        database,
        cache,
        interviews,
        applicants,
        company: seeded.company,
        team: seeded.team,
        interviewers: seeded.interviewers,
        session: seeded.session,
    })
}

fn wall_clock(zone: FixedOffset, day: NaiveDate, hour: u32) -> Result<DateTime<Utc>, SchedulingError> {
    day.and_hms_opt(hour, 0, 0)
        .and_then(|naive| zone.from_local_datetime(&naive).single())
        .map(|local| local.with_timezone(&Utc))
        .ok_or_else(|| SchedulingError::BadInput(format!("{day} {hour}:00 is not a valid time")))
}

fn load_scheduling_config() -> Result<SchedulingConfig, AppError> {
    Ok(AppConfig::load()?.scheduling)
}

pub(crate) async fn run_rollover(args: RolloverArgs) -> Result<(), AppError> {
    let config = load_scheduling_config()?;
    let now = args.now.unwrap_or_else(Utc::now);
    let policy = if args.catch_up {
        RolloverPolicy::CatchUp
    } else {
        config.rollover_policy
    };

    let anchor = (now - Duration::days(28)).with_timezone(&config.zone.offset).date_naive();
    let tenant = seed_tenant(&config, anchor, now - Duration::days(28)).await?;
    println!("Rollover sweep at {} ({:?})", now.with_timezone(&tenant.zone), policy);
    print_schedules(&tenant, "Before").await;

    let outcome = tenant.interviews.rollover(now, policy).await?;
    println!(
        "- {} recurring anchor(s) advanced, {} elapsed one-shot(s) deleted",
        outcome.advanced, outcome.deleted
    );
    print_schedules(&tenant, "After").await;
    Ok(())
}

pub(crate) async fn run_import(args: ImportArgs) -> Result<(), AppError> {
    let config = load_scheduling_config()?;
    let now = Utc::now();
    let records = parse_board_export(fs::File::open(&args.csv)?)?;

    let database = Arc::new(Database::new());
    let cache = Arc::new(MemorySessionCache::default());
    let tenancy = TenancyService::new(database.clone(), config.clone());
    let applicants = ApplicantService::new(
        database.clone(),
        Arc::new(MemoryDocumentStorage::default()),
        Arc::new(OfflineCalendar),
        cache,
    );

    let company = tenancy.create_company(&args.company).await?;
    let team = tenancy
        .create_team(
            company.id,
            &TeamDraft {
                name: args.team.clone(),
                rounds: 1,
                assign_mode: AssignMode::Manual,
            },
        )
        .await?;

    let summary = applicants
        .import(company.id, &team.hash_key, &records, now)
        .await?;
    println!(
        "Imported {} into {} / {}: {} created, {} updated",
        args.csv.display(),
        company.name,
        team.name,
        summary.created,
        summary.updated
    );

    if let Some(dir) = args.documents.as_deref() {
        let uploaded = upload_resumes(&applicants, &database, &company, &team, &records, dir).await?;
        println!("Uploaded {uploaded} resume(s) from {}", dir.display());
    }

    let tables = database.read().await;
    for applicant in tables.applicants_of_team(team.id) {
        let status = tables
            .status(applicant.status_id)
            .map(|status| status.name.as_str())
            .unwrap_or("-");
        println!(
            "- {} ({}:{}) -> {}",
            applicant.name, applicant.site, applicant.outer_id, status
        );
    }
    Ok(())
}

async fn upload_resumes(
    applicants: &DemoApplicants,
    database: &Database,
    company: &Company,
    team: &Team,
    records: &[BoardRecord],
    dir: &Path,
) -> Result<usize, AppError> {
    let mut uploaded = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let (Some(stem), Some(extension)) = (
            path.file_stem().and_then(|stem| stem.to_str()),
            path.extension().and_then(|ext| ext.to_str()),
        ) else {
            continue;
        };
        let Some(record) = records.iter().find(|record| record.outer_id == stem) else {
            println!("  skipping {}: no applicant with outer id {stem}", path.display());
            continue;
        };
        let applicant = {
            let tables = database.read().await;
            tables
                .find_applicant(team.id, &record.site, &record.outer_id)
                .map(|row| row.hash_key.clone())
        };
        let Some(applicant) = applicant else {
            continue;
        };

        let content_type = mime_guess::from_path(&path).first().map(|mime| mime.to_string());
        let key = applicants
            .upload_document(
                company.id,
                &applicant,
                DocumentKind::Resume,
                extension,
                fs::read(&path)?,
                content_type,
            )
            .await?;
        println!("  stored {key}");
        uploaded += 1;
    }
    Ok(uploaded)
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let config = load_scheduling_config()?;
    let now = args.now.unwrap_or_else(Utc::now);
    let anchor = now.with_timezone(&config.zone.offset).date_naive();
    let tenant = seed_tenant(&config, anchor, now).await?;

    println!("Interview scheduling demo");
    println!(
        "Tenant: {} / {} ({} interviewers, auto assignment)",
        tenant.company.name,
        tenant.team.name,
        tenant.interviewers.len()
    );

    let records = match args.csv {
        Some(path) => parse_board_export(fs::File::open(path)?)?,
        None => parse_board_export(SAMPLE_EXPORT.as_bytes())?,
    };
    let summary = tenant
        .applicants
        .import(tenant.company.id, &tenant.team.hash_key, &records, now)
        .await?;
    println!(
        "\nBoard import: {} created, {} updated",
        summary.created, summary.updated
    );

    let Some(first) = records.first() else {
        println!("No applicants to schedule");
        return Ok(());
    };
    let applicant = {
        let tables = tenant.database.read().await;
        tables
            .find_applicant(tenant.team.id, &first.site, &first.outer_id)
            .map(|row| row.hash_key.clone())
            .ok_or(SchedulingError::NotFound("applicant"))?
    };

    let key = tenant
        .applicants
        .upload_document(
            tenant.company.id,
            &applicant,
            DocumentKind::Resume,
            "pdf",
            b"%PDF-1.7 demo resume".to_vec(),
            mime_guess::from_ext("pdf").first().map(|mime| mime.to_string()),
        )
        .await?;
    println!(
        "- {} submitted {} -> {}",
        first.name,
        key,
        status_of(&tenant, &applicant).await
    );

    let grid = tenant
        .interviews
        .availability(tenant.company.id, &applicant, now)
        .await?;
    print_grid(&grid);

    let Some(slot) = grid.options.iter().find(|option| option.reservable) else {
        println!("\nNo reservable slot in the browse window");
        return Ok(());
    };
    let booking = tenant
        .interviews
        .book(
            &tenant.session,
            &applicant,
            BookingRequest {
                start: slot.start,
                interviewers: None,
            },
            now,
        )
        .await?;
    println!(
        "\nBooked round {} at {} with {} -> {}",
        booking.round,
        booking.start,
        interviewer_names(&tenant, &booking.interviewers).join(", "),
        status_of(&tenant, &applicant).await
    );

    tenant
        .cache
        .set(
            tenant.session.user_hash_key.as_str(),
            CacheField::OauthRefreshToken,
            "demo-refresh-token".to_string(),
        )
        .await
        .map_err(SchedulingError::from)?;
    let url = tenant
        .applicants
        .publish_meeting_url(&tenant.session, &applicant)
        .await?;
    println!("Meeting link: {url}");

    let after = booking.end.with_timezone(&Utc) + Duration::minutes(1);
    let outcome = tenant
        .interviews
        .rollover(after, config.rollover_policy)
        .await?;
    println!(
        "\nRollover at {}: {} advanced, {} deleted",
        after.with_timezone(&tenant.zone),
        outcome.advanced,
        outcome.deleted
    );
    print_schedules(&tenant, "Remaining").await;

    Ok(())
}

fn print_grid(grid: &AvailabilityGrid) {
    println!("\nAvailability ({} dates)", grid.dates.len());
    for date in &grid.dates {
        let day = date.date_naive();
        let (open, total) = grid
            .options
            .iter()
            .filter(|option| option.start.date_naive() == day)
            .fold((0, 0), |(open, total), option| {
                (open + usize::from(option.reservable), total + 1)
            });
        println!("- {} {:?}: {open}/{total} ticks open", day, day.weekday());
    }
}

async fn status_of(tenant: &DemoTenant, applicant: &HashKey) -> String {
    let tables = tenant.database.read().await;
    tables
        .applicant_by_key(tenant.company.id, applicant)
        .and_then(|row| tables.status(row.status_id))
        .map(|status| status.name.clone())
        .unwrap_or_else(|| "-".to_string())
}

fn interviewer_names(tenant: &DemoTenant, keys: &[HashKey]) -> Vec<String> {
    keys.iter()
        .map(|key| {
            tenant
                .interviewers
                .iter()
                .find(|user| &user.hash_key == key)
                .map(|user| user.name.clone())
                .unwrap_or_else(|| key.to_string())
        })
        .collect()
}

async fn print_schedules(tenant: &DemoTenant, label: &str) {
    let tables = tenant.database.read().await;
    println!("{label}:");
    for schedule in tables.schedules() {
        println!(
            "- {} [{:?}] {} -> {}",
            schedule.title,
            schedule.frequency,
            schedule.start.with_timezone(&tenant.zone),
            schedule.end.with_timezone(&tenant.zone)
        );
    }
}
