use crate::infra::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use axum::Json;
use recruit::cache::{SessionCache, SessionContext};
use recruit::ids::HashKey;
use recruit::store::Database;
use recruit::workflows::applicants::{
    parse_board_export, ApplicantService, CalendarProvider, DocumentKind, DocumentStorage,
    ImportSummary,
};
use recruit::workflows::interviews::{
    interview_router, HolidayOracle, InterviewService, SchedulingError, SESSION_HEADER,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared handles for the applicant intake endpoints.
pub(crate) struct ApplicantApi<S, P, C> {
    pub(crate) applicants: Arc<ApplicantService<S, P, C>>,
    pub(crate) database: Arc<Database>,
    pub(crate) cache: Arc<C>,
}

impl<S, P, C> Clone for ApplicantApi<S, P, C> {
    fn clone(&self) -> Self {
        Self {
            applicants: self.applicants.clone(),
            database: self.database.clone(),
            cache: self.cache.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct MeetingResponse {
    pub(crate) applicant: HashKey,
    pub(crate) meet_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DocumentResponse {
    pub(crate) applicant: HashKey,
    pub(crate) key: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DocumentQuery {
    pub(crate) extension: Option<String>,
}

pub(crate) fn with_recruiting_routes<O, C, S, P>(
    interviews: Arc<InterviewService<O, C>>,
    applicants: ApplicantApi<S, P, C>,
) -> axum::Router
where
    O: HolidayOracle + 'static,
    C: SessionCache + 'static,
    S: DocumentStorage,
    P: CalendarProvider,
{
    let intake = axum::Router::new()
        .route(
            "/api/v1/team/imports",
            axum::routing::post(import_endpoint::<S, P, C>),
        )
        .route(
            "/api/v1/applicants/:applicant/meeting",
            axum::routing::post(meeting_endpoint::<S, P, C>),
        )
        .route(
            "/api/v1/applicants/:applicant/documents/:kind",
            axum::routing::put(upload_endpoint::<S, P, C>)
                .get(download_endpoint::<S, P, C>),
        )
        .with_state(applicants);

    interview_router(interviews)
        .merge(intake)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

async fn caller<C>(cache: &C, headers: &HeaderMap) -> Result<SessionContext, SchedulingError>
where
    C: SessionCache,
{
    let key = headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or_else(|| SchedulingError::BadInput(format!("missing {SESSION_HEADER} header")))?;
    Ok(SessionContext::resolve(cache, key).await?)
}

/// Upserts a job-board CSV export (request body) into the caller's team.
pub(crate) async fn import_endpoint<S, P, C>(
    State(api): State<ApplicantApi<S, P, C>>,
    headers: HeaderMap,
    body: String,
) -> Result<Json<ImportSummary>, SchedulingError>
where
    S: DocumentStorage,
    P: CalendarProvider,
    C: SessionCache + 'static,
{
    let session = caller(api.cache.as_ref(), &headers).await?;
    let team_id = session.team_id.ok_or(SchedulingError::NotFound("team"))?;
    let team = {
        let tables = api.database.read().await;
        tables
            .team(team_id)
            .filter(|team| team.company_id == session.company_id)
            .map(|team| team.hash_key.clone())
            .ok_or(SchedulingError::NotFound("team"))?
    };

    let records = parse_board_export(body.as_bytes())?;
    let summary = api
        .applicants
        .import(session.company_id, &team, &records, chrono::Utc::now())
        .await?;
    Ok(Json(summary))
}

pub(crate) async fn meeting_endpoint<S, P, C>(
    State(api): State<ApplicantApi<S, P, C>>,
    headers: HeaderMap,
    Path(applicant): Path<String>,
) -> Result<Json<MeetingResponse>, SchedulingError>
where
    S: DocumentStorage,
    P: CalendarProvider,
    C: SessionCache + 'static,
{
    let session = caller(api.cache.as_ref(), &headers).await?;
    let applicant = HashKey(applicant);
    let meet_url = api
        .applicants
        .publish_meeting_url(&session, &applicant)
        .await?;
    Ok(Json(MeetingResponse {
        applicant,
        meet_url,
    }))
}

fn document_kind(raw: &str) -> Result<DocumentKind, SchedulingError> {
    DocumentKind::parse(raw)
        .ok_or_else(|| SchedulingError::BadInput(format!("unknown document kind '{raw}'")))
}

/// Stores the request body as the applicant's document. The extension comes from
/// `?extension=` or, failing that, from the request's content type.
pub(crate) async fn upload_endpoint<S, P, C>(
    State(api): State<ApplicantApi<S, P, C>>,
    headers: HeaderMap,
    Path((applicant, kind)): Path<(String, String)>,
    Query(query): Query<DocumentQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<DocumentResponse>), SchedulingError>
where
    S: DocumentStorage,
    P: CalendarProvider,
    C: SessionCache + 'static,
{
    let session = caller(api.cache.as_ref(), &headers).await?;
    let kind = document_kind(&kind)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let extension = query
        .extension
        .or_else(|| {
            content_type
                .as_deref()
                .and_then(mime_guess::get_mime_extensions_str)
                .and_then(|extensions| extensions.first())
                .map(|extension| extension.to_string())
        })
        .unwrap_or_default();

    let applicant = HashKey(applicant);
    let key = api
        .applicants
        .upload_document(
            session.company_id,
            &applicant,
            kind,
            &extension,
            body.to_vec(),
            content_type,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(DocumentResponse { applicant, key })))
}

pub(crate) async fn download_endpoint<S, P, C>(
    State(api): State<ApplicantApi<S, P, C>>,
    headers: HeaderMap,
    Path((applicant, kind)): Path<(String, String)>,
) -> Result<Response, SchedulingError>
where
    S: DocumentStorage,
    P: CalendarProvider,
    C: SessionCache + 'static,
{
    let session = caller(api.cache.as_ref(), &headers).await?;
    let kind = document_kind(&kind)?;
    let bytes = api
        .applicants
        .download_document(session.company_id, &HashKey(applicant), kind)
        .await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
