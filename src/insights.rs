//! Compare body battery before and after a life change.
//!
//! The baseline is the mean of up to seven daily aggregates immediately
//! preceding the change day; the impact is the latest day's percentage
//! difference from that baseline.

use chrono::NaiveDate;
use serde::Serialize;

use crate::changes::LifeChange;
use crate::wellness::DailyAggregate;

/// Days before the change that form the baseline.
pub const PRE_CHANGE_WINDOW_DAYS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PreChangeAverages {
    pub high: i64,
    pub low: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Impact {
    pub high_percent: i64,
    pub low_percent: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Insight {
    pub change: LifeChange,
    pub title: String,
    pub change_index: Option<usize>,
    pub pre_change_averages: Option<PreChangeAverages>,
    pub impact: Option<Impact>,
}

/// Position of the change day in chronologically ordered `data`.
pub fn change_index(data: &[DailyAggregate], change_date: NaiveDate) -> Option<usize> {
    data.iter().position(|d| d.date == change_date)
}

pub fn pre_change_averages(
    data: &[DailyAggregate],
    change_date: NaiveDate,
) -> Option<PreChangeAverages> {
    let idx = change_index(data, change_date)?;
    let window = &data[idx.saturating_sub(PRE_CHANGE_WINDOW_DAYS)..idx];
    if window.is_empty() {
        return None;
    }

    let n = window.len() as f64;
    let high = window.iter().map(|d| d.high).sum::<f64>() / n;
    let low = window.iter().map(|d| d.low).sum::<f64>() / n;
    Some(PreChangeAverages {
        high: round_half_up(high),
        low: round_half_up(low),
    })
}

/// Latest day against the baseline. `None` when there is no data or a
/// baseline of zero would make the percentage meaningless.
pub fn impact(data: &[DailyAggregate], averages: &PreChangeAverages) -> Option<Impact> {
    let latest = data.last()?;
    if averages.high == 0 || averages.low == 0 {
        return None;
    }

    let percent = |value: f64, base: i64| {
        let base = base as f64;
        round_half_up((value - base) / base * 100.0)
    };
    Some(Impact {
        high_percent: percent(latest.high, averages.high),
        low_percent: percent(latest.low, averages.low),
    })
}

pub fn summarize(change: &LifeChange, data: &[DailyAggregate]) -> Insight {
    let averages = pre_change_averages(data, change.date);
    Insight {
        title: format!("Impact of {} {}", change.kind.gerund(), change.name),
        change_index: change_index(data, change.date),
        impact: averages.as_ref().and_then(|a| impact(data, a)),
        pre_change_averages: averages,
        change: change.clone(),
    }
}

/// Halves round towards positive infinity.
fn round_half_up(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}
