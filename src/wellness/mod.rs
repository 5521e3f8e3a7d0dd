//! Garmin wellness data: the body battery fetch and its reduction to daily
//! high/low aggregates.

mod client;
mod normalize;

pub use client::{fetch_body_battery, STRESS_DETAILS_PATH};
pub use normalize::{detail_blocks, is_finite_number, normalize, DailyAggregate};

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::Serialize;

use crate::error::AuthError;

/// Inclusive range of UTC calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, AuthError> {
        if start > end {
            return Err(AuthError::BadRequest(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// `days` days back from `today`, `today` included.
    pub fn trailing_days(days: u32, today: NaiveDate) -> Result<Self, AuthError> {
        let start = today
            .checked_sub_signed(Duration::days(i64::from(days)))
            .ok_or_else(|| {
                AuthError::BadRequest(format!("{days} days before {today} is out of range"))
            })?;
        Ok(Self { start, end: today })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Epoch seconds `[start 00:00 UTC, end + 1 day 00:00 UTC)`.
    pub fn epoch_bounds(&self) -> (i64, i64) {
        let midnight = |d: NaiveDate| d.and_time(NaiveTime::MIN).and_utc().timestamp();
        (midnight(self.start), midnight(self.end) + 86_400)
    }
}
