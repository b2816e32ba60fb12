use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::assignment::BookingRequest;
use super::error::SchedulingError;
use super::holidays::HolidayOracle;
use super::pipeline::PipelineLayout;
use super::service::InterviewService;
use super::team_config::AssignRuleUpdate;
use crate::cache::{SessionCache, SessionContext};
use crate::ids::HashKey;
use crate::store::PipelineEvent;

/// Header carrying the caller's user hash key.
pub const SESSION_HEADER: &str = "x-session-key";

type Shared<O, C> = State<Arc<InterviewService<O, C>>>;

/// Router exposing the interview scheduling endpoints.
pub fn interview_router<O, C>(service: Arc<InterviewService<O, C>>) -> Router
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    Router::new()
        .route(
            "/api/v1/applicants/:applicant/availability",
            get(availability_handler::<O, C>),
        )
        .route(
            "/api/v1/applicants/:applicant/bookings",
            post(booking_handler::<O, C>),
        )
        .route(
            "/api/v1/applicants/:applicant/events",
            post(event_handler::<O, C>),
        )
        .route(
            "/api/v1/team/pipeline",
            get(pipeline_handler::<O, C>).put(reconfigure_handler::<O, C>),
        )
        .route("/api/v1/team/settings", get(settings_handler::<O, C>))
        .route("/api/v1/team/rounds", put(rounds_handler::<O, C>))
        .route(
            "/api/v1/team/rounds/:round/minimum",
            put(round_minimum_handler::<O, C>),
        )
        .route(
            "/api/v1/team/rounds/:round/eligibility",
            put(eligibility_handler::<O, C>),
        )
        .route("/api/v1/team/priority", put(priority_handler::<O, C>))
        .route("/api/v1/team/assign-rule", put(assign_rule_handler::<O, C>))
        .route("/api/v1/rollover", post(rollover_handler::<O, C>))
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventPayload {
    pub event: PipelineEvent,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoundsPayload {
    pub rounds: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct MinimumPayload {
    pub user_min: u8,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UsersPayload {
    pub users: Vec<HashKey>,
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, SchedulingError>) -> Response {
    match result {
        Ok(body) => (status, Json(body)).into_response(),
        Err(error) => error.into_response(),
    }
}

async fn session_of<O, C>(
    service: &InterviewService<O, C>,
    headers: &HeaderMap,
) -> Result<SessionContext, SchedulingError>
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let key = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| SchedulingError::BadInput(format!("missing {SESSION_HEADER} header")))?;
    service.session(key.trim()).await
}

pub(crate) async fn availability_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Path(applicant): Path<String>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service
            .availability(session.company_id, &HashKey(applicant), Utc::now())
            .await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn booking_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Path(applicant): Path<String>,
    Json(request): Json<BookingRequest>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service
            .book(&session, &HashKey(applicant), request, Utc::now())
            .await
    }
    .await;
    respond(StatusCode::CREATED, result)
}

pub(crate) async fn event_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Path(applicant): Path<String>,
    Json(payload): Json<EventPayload>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service
            .apply_event(&session, &HashKey(applicant), payload.event)
            .await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn pipeline_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service.pipeline(&session).await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn reconfigure_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Json(layout): Json<PipelineLayout>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service.reconfigure_pipeline(&session, &layout).await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn settings_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service.team_settings(&session).await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn rounds_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Json(payload): Json<RoundsPayload>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service.update_rounds(&session, payload.rounds).await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn round_minimum_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Path(round): Path<u8>,
    Json(payload): Json<MinimumPayload>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service
            .set_round_minimum(&session, round, payload.user_min)
            .await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn eligibility_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Path(round): Path<u8>,
    Json(payload): Json<UsersPayload>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service
            .replace_eligibility(&session, round, &payload.users)
            .await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn priority_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Json(payload): Json<UsersPayload>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service.replace_priority(&session, &payload.users).await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn assign_rule_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
    Json(update): Json<AssignRuleUpdate>,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        let session = session_of(&service, &headers).await?;
        service.set_assign_rule(&session, update).await
    }
    .await;
    respond(StatusCode::OK, result)
}

pub(crate) async fn rollover_handler<O, C>(
    State(service): Shared<O, C>,
    headers: HeaderMap,
) -> Response
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
{
    let result = async {
        session_of(&service, &headers).await?;
        let policy = service.config().rollover_policy;
        service.rollover(Utc::now(), policy).await
    }
    .await;
    respond(StatusCode::OK, result)
}
