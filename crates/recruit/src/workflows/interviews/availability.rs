//! Reservable grid for an applicant: business dates times working-hour ticks.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike, Utc};
use serde::Serialize;

use super::calendar::{self, BusyInterval, ExpansionWindow};
use super::error::SchedulingError;
use crate::config::SchedulingConfig;
use crate::ids::HashKey;
use crate::store::{Applicant, Tables, TeamId, UserId};

/// One wall-clock tick and whether any team member is free at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotOption {
    pub start: DateTime<FixedOffset>,
    pub reservable: bool,
}

/// The applicant's existing booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CurrentSchedule {
    pub start: DateTime<FixedOffset>,
    pub hash_key: HashKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailabilityGrid {
    pub dates: Vec<DateTime<FixedOffset>>,
    pub options: Vec<SlotOption>,
    pub current_schedule: Option<CurrentSchedule>,
}

/// The `D` business dates starting `lead_days` after `now`.
pub fn browse_window(now: DateTime<Utc>, config: &SchedulingConfig) -> ExpansionWindow {
    let first = (now + Duration::days(i64::from(config.lead_days)))
        .with_timezone(&config.zone.offset)
        .date_naive();
    ExpansionWindow::new(first, config.browse_days)
}

/// Wall-clock tick times from the first to the last working tick, inclusive.
pub fn tick_times(config: &SchedulingConfig) -> Vec<NaiveTime> {
    let step = i64::from(config.slot_minutes.max(1));
    let first = i64::from(config.workday_start.num_seconds_from_midnight() / 60);
    let last = i64::from(config.workday_end.num_seconds_from_midnight() / 60);

    let mut times = Vec::new();
    let mut minute = first;
    while minute <= last {
        if let Some(time) = NaiveTime::from_hms_opt((minute / 60) as u32, (minute % 60) as u32, 0) {
            times.push(time);
        }
        minute += step;
    }
    times
}

/// Whether `start` sits exactly on a working tick in the business zone.
pub fn on_tick_grid(start: DateTime<FixedOffset>, config: &SchedulingConfig) -> bool {
    let local = start.with_timezone(&config.zone.offset);
    local.nanosecond() == 0 && tick_times(config).contains(&local.time())
}

/// Busy intervals of every member of a team, expanded for one window.
#[derive(Debug, Clone, Default)]
pub struct TeamCalendar {
    busy: BTreeMap<UserId, Vec<BusyInterval>>,
}

impl TeamCalendar {
    pub fn collect(
        tables: &Tables,
        team_id: TeamId,
        window: &ExpansionWindow,
        zone: FixedOffset,
    ) -> Self {
        let busy = tables
            .members(team_id)
            .into_iter()
            .map(|user| {
                let intervals = tables
                    .schedules_of_user(user)
                    .into_iter()
                    .flat_map(|schedule| calendar::expand(schedule, window, zone))
                    .collect();
                (user, intervals)
            })
            .collect();
        Self { busy }
    }

    pub fn members(&self) -> impl Iterator<Item = UserId> + '_ {
        self.busy.keys().copied()
    }

    pub fn is_member(&self, user: UserId) -> bool {
        self.busy.contains_key(&user)
    }

    /// Free at the instant `tick` under half-open coverage.
    pub fn free_at(&self, user: UserId, tick: DateTime<FixedOffset>) -> bool {
        self.busy
            .get(&user)
            .map(|intervals| !intervals.iter().any(|busy| busy.covers(tick)))
            .unwrap_or(false)
    }

    /// Free over the whole interval `[start, end)`.
    pub fn free_between(
        &self,
        user: UserId,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> bool {
        self.busy
            .get(&user)
            .map(|intervals| !intervals.iter().any(|busy| busy.overlaps(start, end)))
            .unwrap_or(false)
    }

    pub fn anyone_free_at(&self, tick: DateTime<FixedOffset>) -> bool {
        self.members().any(|user| self.free_at(user, tick))
    }
}

/// Pure per-tick evaluation; a holiday date yields only closed ticks.
pub fn build_options(
    calendar: &TeamCalendar,
    window: &ExpansionWindow,
    holidays: &BTreeSet<NaiveDate>,
    config: &SchedulingConfig,
) -> Vec<SlotOption> {
    let zone = config.zone.offset;
    let times = tick_times(config);
    let mut options = Vec::with_capacity(window.days().count() * times.len());

    for date in window.days() {
        let holiday = holidays.contains(&date);
        for time in &times {
            let Some(start) = calendar::at(date, *time, zone) else {
                continue;
            };
            options.push(SlotOption {
                start,
                reservable: !holiday && calendar.anyone_free_at(start),
            });
        }
    }
    options
}

pub fn window_dates(window: &ExpansionWindow, zone: FixedOffset) -> Vec<DateTime<FixedOffset>> {
    window
        .days()
        .filter_map(|date| calendar::midnight(date, zone))
        .collect()
}

pub fn current_schedule(
    tables: &Tables,
    applicant: &Applicant,
    zone: FixedOffset,
) -> Option<CurrentSchedule> {
    let schedule = tables.schedule(applicant.schedule_id?)?;
    Some(CurrentSchedule {
        start: schedule.start.with_timezone(&zone),
        hash_key: schedule.hash_key.clone(),
    })
}

/// Inputs gathered under the read view; evaluated after the view is released.
#[derive(Debug, Clone)]
pub struct BrowseInputs {
    pub calendar: TeamCalendar,
    pub current_schedule: Option<CurrentSchedule>,
}

pub fn gather(
    tables: &Tables,
    applicant: &Applicant,
    window: &ExpansionWindow,
    config: &SchedulingConfig,
) -> Result<BrowseInputs, SchedulingError> {
    if tables.team(applicant.team_id).is_none() {
        return Err(SchedulingError::NotFound("team"));
    }
    Ok(BrowseInputs {
        calendar: TeamCalendar::collect(tables, applicant.team_id, window, config.zone.offset),
        current_schedule: current_schedule(tables, applicant, config.zone.offset),
    })
}

pub fn assemble(
    inputs: BrowseInputs,
    window: &ExpansionWindow,
    holidays: &BTreeSet<NaiveDate>,
    config: &SchedulingConfig,
) -> AvailabilityGrid {
    AvailabilityGrid {
        dates: window_dates(window, config.zone.offset),
        options: build_options(&inputs.calendar, window, holidays, config),
        current_schedule: inputs.current_schedule,
    }
}
