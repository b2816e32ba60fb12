//! Busy-interval model: one-shot and recurring anchors expanded to concrete intervals
//! inside a window of business-zone dates.

use chrono::{DateTime, Datelike, Duration, FixedOffset, Months, NaiveDate, NaiveTime, Utc};

use crate::store::{Frequency, Schedule};

/// Concrete busy interval, half-open `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl BusyInterval {
    pub fn covers(&self, instant: DateTime<FixedOffset>) -> bool {
        self.start <= instant && instant < self.end
    }

    pub fn overlaps(&self, start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> bool {
        self.start < end && start < self.end
    }
}

/// Business-zone dates `[first, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionWindow {
    pub first: NaiveDate,
    pub end: NaiveDate,
}

impl ExpansionWindow {
    pub fn new(first: NaiveDate, days: u32) -> Self {
        Self {
            first,
            end: first + Duration::days(i64::from(days)),
        }
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.first
            .iter_days()
            .take_while(move |day| *day < self.end)
    }

    fn bounds(&self, zone: FixedOffset) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        Some((midnight(self.first, zone)?, midnight(self.end, zone)?))
    }
}

/// Wall-clock instant on `date` in the business zone.
pub fn at(date: NaiveDate, time: NaiveTime, zone: FixedOffset) -> Option<DateTime<FixedOffset>> {
    date.and_time(time).and_local_timezone(zone).single()
}

pub fn midnight(date: NaiveDate, zone: FixedOffset) -> Option<DateTime<FixedOffset>> {
    at(date, NaiveTime::from_hms_opt(0, 0, 0)?, zone)
}

/// Expands a stored anchor into the busy intervals it contributes to `window`.
pub fn expand(schedule: &Schedule, window: &ExpansionWindow, zone: FixedOffset) -> Vec<BusyInterval> {
    let anchor = BusyInterval {
        start: schedule.start.with_timezone(&zone),
        end: schedule.end.with_timezone(&zone),
    };

    match schedule.frequency {
        Frequency::None => match window.bounds(zone) {
            Some((from, to)) if anchor.overlaps(from, to) => vec![anchor],
            _ => Vec::new(),
        },
        Frequency::Monthly | Frequency::Yearly => vec![anchor],
        Frequency::Daily => transpose(&anchor, window, zone, |_| true),
        Frequency::Weekly => {
            let weekday = anchor.start.weekday();
            transpose(&anchor, window, zone, |day| day.weekday() == weekday)
        }
    }
}

fn transpose<F>(
    anchor: &BusyInterval,
    window: &ExpansionWindow,
    zone: FixedOffset,
    keep: F,
) -> Vec<BusyInterval>
where
    F: Fn(NaiveDate) -> bool,
{
    let time = anchor.start.time();
    let length = anchor.end - anchor.start;

    window
        .days()
        .filter(|day| keep(*day))
        .filter_map(|day| {
            let start = at(day, time, zone)?;
            Some(BusyInterval {
                start,
                end: start + length,
            })
        })
        .collect()
}

/// Next occurrence of a recurring anchor, computed on the business-zone wall clock.
pub fn advance(
    frequency: Frequency,
    instant: DateTime<Utc>,
    zone: FixedOffset,
) -> Option<DateTime<Utc>> {
    let local = instant.with_timezone(&zone).naive_local();
    let next = match frequency {
        Frequency::None => return None,
        Frequency::Daily => local + Duration::days(1),
        Frequency::Weekly => local + Duration::days(7),
        Frequency::Monthly => local.checked_add_months(Months::new(1))?,
        Frequency::Yearly => local.checked_add_months(Months::new(12))?,
    };
    next.and_local_timezone(zone)
        .single()
        .map(|value| value.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::HashKey;
    use crate::store::{CompanyId, ScheduleId, TeamId};
    use chrono::TimeZone;

    fn jst() -> FixedOffset {
        FixedOffset::east_opt(9 * 3600).expect("valid offset")
    }

    fn schedule(frequency: Frequency, start: DateTime<FixedOffset>, minutes: i64) -> Schedule {
        Schedule {
            id: ScheduleId(1),
            company_id: CompanyId(1),
            team_id: TeamId(1),
            hash_key: HashKey::from("schedule_test"),
            title: "busy".to_string(),
            frequency,
            interview: false,
            start: start.with_timezone(&Utc),
            end: (start + Duration::minutes(minutes)).with_timezone(&Utc),
            updated_at: start.with_timezone(&Utc),
        }
    }

    fn window() -> ExpansionWindow {
        ExpansionWindow::new(NaiveDate::from_ymd_opt(2025, 3, 8).expect("date"), 14)
    }

    #[test]
    fn daily_and_weekly_yield_one_interval_per_period() {
        let anchor = jst().with_ymd_and_hms(2024, 12, 2, 9, 0, 0).unwrap();

        let daily = expand(&schedule(Frequency::Daily, anchor, 60), &window(), jst());
        assert_eq!(daily.len(), 14);
        let weekly = expand(&schedule(Frequency::Weekly, anchor, 60), &window(), jst());
        assert_eq!(weekly.len(), 2);

        let mondays: Vec<NaiveDate> = weekly.iter().map(|b| b.start.date_naive()).collect();
        assert_eq!(
            mondays,
            vec![
                NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 17).unwrap(),
            ]
        );
        assert_eq!(weekly[0].start.time(), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(weekly[0].end - weekly[0].start, Duration::minutes(60));
    }

    #[test]
    fn anchors_inside_the_window_cover_every_matching_day() {
        let anchor = jst().with_ymd_and_hms(2025, 3, 12, 9, 0, 0).unwrap();

        let daily = expand(&schedule(Frequency::Daily, anchor, 30), &window(), jst());
        assert_eq!(daily.len(), 14);
        assert_eq!(
            daily[0].start,
            jst().with_ymd_and_hms(2025, 3, 8, 9, 0, 0).unwrap()
        );

        let weekly = expand(&schedule(Frequency::Weekly, anchor, 30), &window(), jst());
        let wednesdays: Vec<NaiveDate> = weekly.iter().map(|b| b.start.date_naive()).collect();
        assert_eq!(
            wednesdays,
            vec![
                NaiveDate::from_ymd_opt(2025, 3, 12).unwrap(),
                NaiveDate::from_ymd_opt(2025, 3, 19).unwrap(),
            ]
        );

        let late = jst().with_ymd_and_hms(2025, 3, 20, 9, 0, 0).unwrap();
        let weekly = expand(&schedule(Frequency::Weekly, late, 30), &window(), jst());
        assert_eq!(weekly.len(), 2);
        assert_eq!(weekly[0].start.date_naive(), NaiveDate::from_ymd_opt(2025, 3, 13).unwrap());
    }

    #[test]
    fn one_shot_outside_window_is_dropped() {
        let inside = jst().with_ymd_and_hms(2025, 3, 12, 10, 0, 0).unwrap();
        let outside = jst().with_ymd_and_hms(2025, 4, 12, 10, 0, 0).unwrap();
        assert_eq!(
            expand(&schedule(Frequency::None, inside, 60), &window(), jst()).len(),
            1
        );
        assert!(expand(&schedule(Frequency::None, outside, 60), &window(), jst()).is_empty());
    }

    #[test]
    fn monthly_anchor_passes_through() {
        let anchor = jst().with_ymd_and_hms(2025, 1, 5, 10, 0, 0).unwrap();
        let expanded = expand(&schedule(Frequency::Monthly, anchor, 60), &window(), jst());
        assert_eq!(expanded.len(), 1);
        assert_eq!(expanded[0].start, anchor);
    }

    #[test]
    fn covers_is_half_open() {
        let start = jst().with_ymd_and_hms(2025, 3, 10, 9, 0, 0).unwrap();
        let busy = BusyInterval {
            start,
            end: start + Duration::hours(1),
        };
        assert!(busy.covers(start));
        assert!(busy.covers(start + Duration::minutes(30)));
        assert!(!busy.covers(start + Duration::hours(1)));
    }

    #[test]
    fn advance_uses_wall_clock_periods() {
        let start = jst()
            .with_ymd_and_hms(2025, 1, 31, 0, 0, 0)
            .unwrap()
            .with_timezone(&Utc);
        let monthly = advance(Frequency::Monthly, start, jst()).unwrap();
        assert_eq!(
            monthly.with_timezone(&jst()).date_naive(),
            NaiveDate::from_ymd_opt(2025, 2, 28).unwrap()
        );
        let yearly = advance(Frequency::Yearly, start, jst()).unwrap();
        assert_eq!(
            yearly.with_timezone(&jst()).date_naive(),
            NaiveDate::from_ymd_opt(2026, 1, 31).unwrap()
        );
        assert!(advance(Frequency::None, start, jst()).is_none());
    }
}
