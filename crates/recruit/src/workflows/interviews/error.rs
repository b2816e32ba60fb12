use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

use super::holidays::HolidayError;
use crate::cache::CacheError;
use crate::store::StoreError;
use crate::workflows::applicants::{CalendarError, DocumentStorageError, ImportError};

/// Domain-level failure kinds, independent of transport.
#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid input: {0}")]
    BadInput(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} name is already taken")]
    DuplicateName(&'static str),
    #[error("team is still in use: {0}")]
    TeamInUse(String),
    #[error("round {round} needs {required} interviewer(s) but only {available} are free")]
    InsufficientCapacity {
        round: u8,
        required: u8,
        available: usize,
    },
    #[error("interviewer {0} is not eligible or not free for this slot")]
    ManualChoiceIneligible(String),
    #[error("the proposed slot is no longer bookable")]
    SlotConflict,
    #[error("no status is bound to event '{0}' for this team")]
    InvalidEvent(&'static str),
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl SchedulingError {
    /// Small unsigned code reported to callers.
    pub const fn code(&self) -> u16 {
        match self {
            SchedulingError::BadInput(_) => 1,
            SchedulingError::NotFound(_) => 2,
            SchedulingError::DuplicateName(_) => 3,
            SchedulingError::TeamInUse(_) => 4,
            SchedulingError::InsufficientCapacity { .. } => 5,
            SchedulingError::ManualChoiceIneligible(_) => 6,
            SchedulingError::SlotConflict => 7,
            SchedulingError::InvalidEvent(_) => 8,
            SchedulingError::Upstream(_) => 9,
            SchedulingError::Internal(_) => 10,
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            SchedulingError::BadInput(_) => "BAD_INPUT",
            SchedulingError::NotFound(_) => "NOT_FOUND",
            SchedulingError::DuplicateName(_) => "CONFLICT_DUPLICATE_NAME",
            SchedulingError::TeamInUse(_) => "CONFLICT_TEAM_IN_USE",
            SchedulingError::InsufficientCapacity { .. } => "INSUFFICIENT_CAPACITY",
            SchedulingError::ManualChoiceIneligible(_) => "MANUAL_CHOICE_INELIGIBLE",
            SchedulingError::SlotConflict => "SLOT_CONFLICT",
            SchedulingError::InvalidEvent(_) => "INVALID_EVENT",
            SchedulingError::Upstream(_) => "UPSTREAM_UNAVAILABLE",
            SchedulingError::Internal(_) => "INTERNAL",
        }
    }

    pub const fn status(&self) -> StatusCode {
        match self {
            SchedulingError::BadInput(_) => StatusCode::BAD_REQUEST,
            SchedulingError::NotFound(_) => StatusCode::NOT_FOUND,
            SchedulingError::DuplicateName(_)
            | SchedulingError::TeamInUse(_)
            | SchedulingError::InsufficientCapacity { .. }
            | SchedulingError::SlotConflict => StatusCode::CONFLICT,
            SchedulingError::ManualChoiceIneligible(_) | SchedulingError::InvalidEvent(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            SchedulingError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            SchedulingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to callers; server-side failures stay opaque.
    pub fn public_message(&self) -> String {
        match self {
            SchedulingError::Upstream(_) => "a dependent service is unavailable".to_string(),
            SchedulingError::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for SchedulingError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound { entity } => SchedulingError::NotFound(entity),
            StoreError::Duplicate {
                entity,
                field: "name",
            } => SchedulingError::DuplicateName(entity),
            StoreError::Duplicate { entity, field } => {
                SchedulingError::BadInput(format!("{entity} with the same {field} already exists"))
            }
            StoreError::Integrity(detail) => SchedulingError::Internal(detail),
        }
    }
}

impl From<HolidayError> for SchedulingError {
    fn from(value: HolidayError) -> Self {
        SchedulingError::Upstream(value.to_string())
    }
}

impl From<CacheError> for SchedulingError {
    fn from(value: CacheError) -> Self {
        match value {
            CacheError::Missing { .. } => SchedulingError::NotFound("session"),
            CacheError::Malformed { field } => {
                SchedulingError::Internal(format!("cache field {field} is malformed"))
            }
            CacheError::Unavailable(detail) => SchedulingError::Upstream(detail),
        }
    }
}

impl From<DocumentStorageError> for SchedulingError {
    fn from(value: DocumentStorageError) -> Self {
        match value {
            DocumentStorageError::NotFound(_) => SchedulingError::NotFound("document"),
            DocumentStorageError::Backend(detail) => SchedulingError::Upstream(detail),
        }
    }
}

impl From<CalendarError> for SchedulingError {
    fn from(value: CalendarError) -> Self {
        SchedulingError::Upstream(value.to_string())
    }
}

impl From<ImportError> for SchedulingError {
    fn from(value: ImportError) -> Self {
        SchedulingError::BadInput(value.to_string())
    }
}

impl IntoResponse for SchedulingError {
    fn into_response(self) -> Response {
        if matches!(
            self,
            SchedulingError::Upstream(_) | SchedulingError::Internal(_)
        ) {
            error!(kind = self.kind(), error = %self, "request failed");
        }
        let body = Json(json!({
            "code": self.code(),
            "error": self.public_message(),
        }));
        (self.status(), body).into_response()
    }
}
