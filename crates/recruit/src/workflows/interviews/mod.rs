//! Interview scheduling and interviewer assignment.
//!
//! Busy intervals come from interviewer schedules (`calendar`), non-working dates from
//! the holiday oracle (`holidays`). `availability` turns both into an applicant's
//! reservable grid, `assignment` staffs a confirmed slot, `pipeline` and `transition`
//! move applicants between team-defined statuses, and `rollover` advances elapsed
//! schedules.

pub mod assignment;
pub mod availability;
pub mod calendar;
pub mod error;
pub mod holidays;
pub mod pipeline;
pub mod rollover;
pub mod router;
pub mod service;
pub mod team_config;
pub mod transition;

#[cfg(test)]
mod tests;

pub use assignment::{Booking, BookingRequest};
pub use availability::{AvailabilityGrid, CurrentSchedule, SlotOption};
pub use calendar::{BusyInterval, ExpansionWindow};
pub use error::SchedulingError;
pub use holidays::{
    FixedHolidays, HolidayError, HolidayFeed, HolidayOracle, MemoizedHolidays,
};
pub use pipeline::{PipelineLayout, PipelineView, ReconfigureSummary, StatusView};
pub use rollover::RolloverOutcome;
pub use router::{interview_router, SESSION_HEADER};
pub use service::InterviewService;
pub use team_config::{AssignRuleUpdate, RoundSettings, TeamSettings};
pub use transition::Transition;
