//! Applicant intake from job boards, document exchange, and meeting links.

pub mod documents;
pub mod import;
pub mod meeting;
pub mod service;

pub use documents::{
    document_key, ConfiguredStorage, DocumentKind, DocumentStorage, DocumentStorageError,
    DriveConnector, GoogleDriveStorage, MemoryDocumentStorage,
};
pub use import::{parse_board_export, BoardRecord, ImportError};
pub use meeting::{CalendarError, CalendarProvider, HttpCalendarProvider};
pub use service::{ApplicantService, ImportSummary};
