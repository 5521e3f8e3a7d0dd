use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::DateRange;

/// One UTC day of body battery readings reduced to its extremes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyAggregate {
    /// Serialized as `YYYY-MM-DD`.
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
}

/// The predicate a reading must pass to count towards a day: a real,
/// finite number. Rejects `NaN` and the infinities.
pub fn is_finite_number(value: f64) -> bool {
    value.is_finite()
}

/// Numeric reading of a raw sample, before the finiteness check.
///
/// JSON numbers and numeric strings qualify. `null`, booleans and empty
/// strings do not: they would otherwise read as a misleading zero.
fn numeric_value(raw: &Value) -> Option<f64> {
    match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if !s.trim().is_empty() => s.trim().parse().ok(),
        _ => None,
    }
}

/// The detail blocks of a stress-details payload.
///
/// Accepts `{"stressDetails": [...]}` or a bare array; anything else has no
/// blocks.
pub fn detail_blocks(payload: &Value) -> &[Value] {
    let blocks = match payload {
        Value::Array(_) => Some(payload),
        Value::Object(map) => map.get("stressDetails"),
        _ => None,
    };
    blocks
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// `(date, value)` for every usable reading of one detail block.
fn block_samples(block: &Value) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
    let base = block.get("startTimeInSeconds").and_then(Value::as_i64);
    let readings = block
        .get("timeOffsetBodyBatteryValues")
        .and_then(Value::as_object);

    base.zip(readings)
        .into_iter()
        .flat_map(|(base, readings)| {
            readings.iter().filter_map(move |(offset, raw)| {
                let offset: i64 = offset.trim().parse().ok()?;
                let ts = base.checked_add(offset)?;
                let date = DateTime::from_timestamp(ts, 0)?.date_naive();
                Some((date, numeric_value(raw)?))
            })
        })
        .filter(|(_, value)| is_finite_number(*value))
}

/// Reduce raw detail blocks to one aggregate per UTC day inside `range`,
/// ascending by date.
///
/// Never fails: blocks without a start time or readings map, unparseable
/// offsets and non-finite values are skipped. A day only appears once it has
/// at least one accepted reading, so no placeholder extremes reach the output.
pub fn normalize(raw_series: &[Value], range: &DateRange) -> Vec<DailyAggregate> {
    let mut days: BTreeMap<NaiveDate, (f64, f64)> = BTreeMap::new();

    for (date, value) in raw_series.iter().flat_map(block_samples) {
        if !range.contains(date) {
            continue;
        }
        days.entry(date)
            .and_modify(|(high, low)| {
                *high = high.max(value);
                *low = low.min(value);
            })
            .or_insert((value, value));
    }

    // BTreeMap iteration is already chronological.
    days.into_iter()
        .map(|(date, (high, low))| DailyAggregate { date, high, low })
        .collect()
}
