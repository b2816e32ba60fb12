use crate::cli::ServeArgs;
use crate::demo::seed_rows;
use crate::infra::{build_services, AppState, LiveInterviews};
use crate::routes::with_recruiting_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use recruit::config::{AppConfig, RolloverPolicy};
use recruit::error::AppError;
use recruit::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let services = build_services(&config).await?;
    if args.seed_demo {
        let now = Utc::now();
        let today = now.with_timezone(&config.scheduling.zone.offset).date_naive();
        let seeded = seed_rows(
            services.applicants.database.clone(),
            services.applicants.cache.as_ref(),
            &config.scheduling,
            today,
            now,
        )
        .await?;
        info!(
            company = %seeded.company.hash_key,
            team = %seeded.team.hash_key,
            session = %seeded.session.user_hash_key,
            "demo tenant seeded"
        );
    }
    let sweeper = if args.no_rollover {
        None
    } else {
        Some(spawn_rollover(
            services.interviews.clone(),
            config.scheduling.rollover_interval(),
            config.scheduling.rollover_policy,
        ))
    };

    let app = with_recruiting_routes(services.interviews.clone(), services.applicants)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "recruiting back-end ready");

    let served = axum::serve(listener, app).await;
    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    served?;
    Ok(())
}

/// Runs the rollover sweep every `period`; the first sweep fires immediately.
pub(crate) fn spawn_rollover(
    interviews: Arc<LiveInterviews>,
    period: Duration,
    policy: RolloverPolicy,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            match interviews.rollover(Utc::now(), policy).await {
                Ok(outcome) => info!(
                    advanced = outcome.advanced,
                    deleted = outcome.deleted,
                    ?policy,
                    "rollover sweep finished"
                ),
                Err(err) => error!(error = %err, "rollover sweep failed"),
            }
        }
    })
}
