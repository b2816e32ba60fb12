//! Non-working dates: national holidays from an external feed plus every weekend.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate, Weekday};
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum HolidayError {
    #[error("holiday feed request failed: {0}")]
    Transport(String),
    #[error("holiday feed answered with status {0}")]
    Status(u16),
    #[error("holiday feed payload is malformed: {0}")]
    Payload(String),
    #[error("year {0} is out of range")]
    InvalidYear(i32),
}

#[async_trait]
pub trait HolidayOracle: Send + Sync {
    /// Every non-working date of `year`, weekends included.
    async fn holidays(&self, year: i32) -> Result<BTreeSet<NaiveDate>, HolidayError>;
}

/// Saturdays and Sundays of `year`.
pub fn weekends(year: i32) -> Result<BTreeSet<NaiveDate>, HolidayError> {
    let first = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(HolidayError::InvalidYear(year))?;
    Ok(first
        .iter_days()
        .take_while(|day| day.year() == year)
        .filter(|day| matches!(day.weekday(), Weekday::Sat | Weekday::Sun))
        .collect())
}

/// Union of the oracle's answers for every year touched by `[first, end)`.
pub async fn holidays_between<O>(
    oracle: &O,
    first: NaiveDate,
    end: NaiveDate,
) -> Result<BTreeSet<NaiveDate>, HolidayError>
where
    O: HolidayOracle + ?Sized,
{
    let last_year = end.pred_opt().unwrap_or(end).year().max(first.year());
    let mut dates = BTreeSet::new();
    for year in first.year()..=last_year {
        dates.extend(oracle.holidays(year).await?);
    }
    Ok(dates)
}

/// JSON feed keyed by `YYYY-MM-DD` (values are holiday names).
#[derive(Debug, Clone)]
pub struct HolidayFeed {
    client: reqwest::Client,
    url_template: String,
}

impl HolidayFeed {
    pub fn new(url_template: impl Into<String>) -> Result<Self, HolidayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|err| HolidayError::Transport(err.to_string()))?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    fn url_for(&self, year: i32) -> String {
        self.url_template.replace("{year}", &year.to_string())
    }
}

#[async_trait]
impl HolidayOracle for HolidayFeed {
    async fn holidays(&self, year: i32) -> Result<BTreeSet<NaiveDate>, HolidayError> {
        let url = self.url_for(year);
        debug!(%url, "fetching holiday feed");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| HolidayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(%url, status = status.as_u16(), "holiday feed rejected request");
            return Err(HolidayError::Status(status.as_u16()));
        }

        let payload: BTreeMap<String, String> = response
            .json()
            .await
            .map_err(|err| HolidayError::Payload(err.to_string()))?;
        parse_feed(year, &payload)
    }
}

pub(crate) fn parse_feed(
    year: i32,
    payload: &BTreeMap<String, String>,
) -> Result<BTreeSet<NaiveDate>, HolidayError> {
    let mut dates = weekends(year)?;
    for key in payload.keys() {
        let date = NaiveDate::parse_from_str(key.trim(), "%Y-%m-%d")
            .map_err(|_| HolidayError::Payload(format!("'{key}' is not a YYYY-MM-DD date")))?;
        if date.year() == year {
            dates.insert(date);
        }
    }
    Ok(dates)
}

/// Caches successful answers per year; failures are not remembered.
#[derive(Debug)]
pub struct MemoizedHolidays<O> {
    inner: O,
    years: Mutex<HashMap<i32, BTreeSet<NaiveDate>>>,
}

impl<O> MemoizedHolidays<O> {
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            years: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl<O> HolidayOracle for MemoizedHolidays<O>
where
    O: HolidayOracle,
{
    async fn holidays(&self, year: i32) -> Result<BTreeSet<NaiveDate>, HolidayError> {
        if let Some(cached) = self.years.lock().await.get(&year) {
            return Ok(cached.clone());
        }
        let fetched = self.inner.holidays(year).await?;
        self.years.lock().await.insert(year, fetched.clone());
        Ok(fetched)
    }
}

/// Offline oracle over a fixed list of national holidays.
#[derive(Debug, Clone, Default)]
pub struct FixedHolidays {
    national: BTreeSet<NaiveDate>,
}

impl FixedHolidays {
    pub fn new<I>(national: I) -> Self
    where
        I: IntoIterator<Item = NaiveDate>,
    {
        Self {
            national: national.into_iter().collect(),
        }
    }
}

#[async_trait]
impl HolidayOracle for FixedHolidays {
    async fn holidays(&self, year: i32) -> Result<BTreeSet<NaiveDate>, HolidayError> {
        let mut dates = weekends(year)?;
        dates.extend(self.national.iter().filter(|day| day.year() == year).copied());
        Ok(dates)
    }
}
