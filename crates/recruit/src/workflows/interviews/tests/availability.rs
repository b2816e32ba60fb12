use super::common::*;
use chrono::{DateTime, Utc};

use crate::store::{AssignMode, Frequency};
use crate::workflows::interviews::{
    AvailabilityGrid, BookingRequest, FixedHolidays, SchedulingError,
};

fn reservable_at(grid: &AvailabilityGrid, instant: DateTime<Utc>) -> bool {
    grid.options
        .iter()
        .find(|option| option.start.with_timezone(&Utc) == instant)
        .map(|option| option.reservable)
        .expect("tick is part of the grid")
}

#[tokio::test]
async fn empty_team_yields_closed_grid() {
    let fx = fixture(3, AssignMode::Manual, &[]).await;
    let applicant = fx.applicant("A-1").await;

    let grid = fx
        .service
        .availability(fx.company.id, &applicant, browse_now())
        .await
        .expect("grid");

    assert_eq!(grid.dates.len(), 14);
    assert_eq!(grid.dates[0].with_timezone(&Utc), tokyo(2025, 3, 8, 0, 0));
    assert_eq!(grid.dates[13].with_timezone(&Utc), tokyo(2025, 3, 21, 0, 0));
    assert_eq!(grid.options.len(), 14 * 23);
    assert!(grid.options.iter().all(|option| !option.reservable));
    assert!(grid.current_schedule.is_none());
}

#[tokio::test]
async fn one_free_member_keeps_ticks_open() {
    let fx = fixture(1, AssignMode::Manual, &["U1", "U2"]).await;
    fx.block(&["U1"], Frequency::Weekly, tokyo(2024, 12, 2, 9, 0), 60)
        .await;
    let applicant = fx.applicant("A-1").await;

    let grid = fx
        .service
        .availability(fx.company.id, &applicant, browse_now())
        .await
        .expect("grid");

    assert!(reservable_at(&grid, tokyo(2025, 3, 10, 9, 0)));
    assert!(reservable_at(&grid, tokyo(2025, 3, 10, 9, 30)));
    assert!(reservable_at(&grid, tokyo(2025, 3, 17, 9, 0)));
    assert!(grid
        .options
        .iter()
        .filter(|option| option.start.date_naive() == date(2025, 3, 8))
        .all(|option| !option.reservable));
}

#[tokio::test]
async fn weekly_block_closes_ticks_half_open() {
    let fx = fixture(1, AssignMode::Manual, &["U1"]).await;
    fx.block(&["U1"], Frequency::Weekly, tokyo(2024, 12, 2, 9, 0), 60)
        .await;
    let applicant = fx.applicant("A-1").await;

    let grid = fx
        .service
        .availability(fx.company.id, &applicant, browse_now())
        .await
        .expect("grid");

    assert!(!reservable_at(&grid, tokyo(2025, 3, 10, 9, 0)));
    assert!(!reservable_at(&grid, tokyo(2025, 3, 10, 9, 30)));
    assert!(reservable_at(&grid, tokyo(2025, 3, 10, 10, 0)));
    assert!(reservable_at(&grid, tokyo(2025, 3, 11, 9, 0)));
    assert!(!reservable_at(&grid, tokyo(2025, 3, 17, 9, 30)));
}

#[tokio::test]
async fn national_holidays_close_the_whole_day() {
    let fx = fixture(1, AssignMode::Manual, &["U1"]).await;
    let applicant = fx.applicant("A-1").await;
    let service = fx.service_with(FixedHolidays::new([date(2025, 3, 20)]));

    let grid = service
        .availability(fx.company.id, &applicant, browse_now())
        .await
        .expect("grid");

    assert!(reservable_at(&grid, tokyo(2025, 3, 19, 12, 0)));
    assert!(grid
        .options
        .iter()
        .filter(|option| option.start.date_naive() == date(2025, 3, 20))
        .all(|option| !option.reservable));
}

#[tokio::test]
async fn holiday_outage_fails_the_request() {
    let fx = fixture(1, AssignMode::Manual, &["U1"]).await;
    let applicant = fx.applicant("A-1").await;
    let service = fx.service_with(UnavailableHolidays);

    match service
        .availability(fx.company.id, &applicant, browse_now())
        .await
    {
        Err(SchedulingError::Upstream(_)) => {}
        other => panic!("expected upstream failure, got {other:?}"),
    }
}

#[tokio::test]
async fn applicants_of_other_tenants_are_invisible() {
    let fx = fixture(1, AssignMode::Manual, &["U1"]).await;
    let applicant = fx.applicant("A-1").await;
    let other = fx.tenancy.create_company("Globex").await.expect("company");

    match fx
        .service
        .availability(other.id, &applicant, browse_now())
        .await
    {
        Err(SchedulingError::NotFound("applicant")) => {}
        other => panic!("expected missing applicant, got {other:?}"),
    }
}

#[tokio::test]
async fn booked_interview_is_reported_as_current_schedule() {
    let fx = fixture(1, AssignMode::Auto, &["U1"]).await;
    let applicant = fx.applicant("A-1").await;
    let start = tokyo(2025, 3, 12, 14, 0).with_timezone(&jst());

    let booking = fx
        .service
        .book(
            &fx.session,
            &applicant,
            BookingRequest {
                start,
                interviewers: None,
            },
            browse_now(),
        )
        .await
        .expect("booked");

    let grid = fx
        .service
        .availability(fx.company.id, &applicant, browse_now())
        .await
        .expect("grid");

    let current = grid.current_schedule.as_ref().expect("current schedule");
    assert_eq!(current.start, start);
    assert_eq!(current.hash_key, booking.schedule);
    assert!(!reservable_at(&grid, tokyo(2025, 3, 12, 14, 0)));
    assert!(!reservable_at(&grid, tokyo(2025, 3, 12, 14, 30)));
    assert!(reservable_at(&grid, tokyo(2025, 3, 12, 15, 0)));
}
