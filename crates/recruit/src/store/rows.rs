use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::HashKey;

macro_rules! row_id {
    ($($name:ident),* $(,)?) => {
        $(
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(pub u64);
        )*
    };
}

row_id!(
    CompanyId,
    TeamId,
    UserId,
    ApplicantId,
    SelectStatusId,
    ScheduleId,
);

/// Tenant root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    pub id: CompanyId,
    pub hash_key: HashKey,
    pub name: String,
}

/// How interviewers are chosen when an applicant's slot is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignMode {
    Manual,
    Auto,
}

/// Ordering rule used by the automatic assignment policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoAssignRule {
    AscByPriority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub company_id: CompanyId,
    pub hash_key: HashKey,
    pub name: String,
    /// Number of interview rounds `N`.
    pub rounds: u8,
    pub assign_mode: AssignMode,
}

/// Interviewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub company_id: CompanyId,
    pub hash_key: HashKey,
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Applicant {
    pub id: ApplicantId,
    pub company_id: CompanyId,
    pub team_id: TeamId,
    pub hash_key: HashKey,
    pub site: String,
    pub outer_id: String,
    pub name: String,
    pub email: Option<String>,
    pub status_id: SelectStatusId,
    /// Last interview round entered; 0 before the first booking.
    pub round: u8,
    pub schedule_id: Option<ScheduleId>,
    pub resume: Option<String>,
    pub curriculum_vitae: Option<String>,
    pub meet_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Team-scoped selection status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectStatus {
    pub id: SelectStatusId,
    pub team_id: TeamId,
    pub hash_key: HashKey,
    pub name: String,
    pub position: u16,
}

/// Events that may move an applicant through a team's pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineEvent {
    Imported,
    DocumentsSubmitted,
    ScheduleFilled,
    Rescheduled,
    InterviewPassed,
    InterviewFailed,
    Offered,
    OfferAccepted,
    OfferDeclined,
}

impl PipelineEvent {
    pub const ALL: [PipelineEvent; 9] = [
        PipelineEvent::Imported,
        PipelineEvent::DocumentsSubmitted,
        PipelineEvent::ScheduleFilled,
        PipelineEvent::Rescheduled,
        PipelineEvent::InterviewPassed,
        PipelineEvent::InterviewFailed,
        PipelineEvent::Offered,
        PipelineEvent::OfferAccepted,
        PipelineEvent::OfferDeclined,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            PipelineEvent::Imported => "imported",
            PipelineEvent::DocumentsSubmitted => "documents_submitted",
            PipelineEvent::ScheduleFilled => "schedule_filled",
            PipelineEvent::Rescheduled => "rescheduled",
            PipelineEvent::InterviewPassed => "interview_passed",
            PipelineEvent::InterviewFailed => "interview_failed",
            PipelineEvent::Offered => "offered",
            PipelineEvent::OfferAccepted => "offer_accepted",
            PipelineEvent::OfferDeclined => "offer_declined",
        }
    }
}

/// Recurrence of a schedule anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub company_id: CompanyId,
    pub team_id: TeamId,
    pub hash_key: HashKey,
    pub title: String,
    pub frequency: Frequency,
    pub interview: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for [`Schedule`].
#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub company_id: CompanyId,
    pub team_id: TeamId,
    pub title: String,
    pub frequency: Frequency,
    pub interview: bool,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Insert payload for [`Applicant`].
#[derive(Debug, Clone)]
pub struct NewApplicant {
    pub company_id: CompanyId,
    pub team_id: TeamId,
    pub site: String,
    pub outer_id: String,
    pub name: String,
    pub email: Option<String>,
    pub status_id: SelectStatusId,
    pub created_at: DateTime<Utc>,
}
