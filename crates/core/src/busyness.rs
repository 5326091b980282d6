//! Current-occupancy estimate from a weekly popularity histogram.
//!
//! Two histogram shapes occur in stored data:
//!
//! - a Monday-indexed array: `[{"data": [{"hour": 6, "occupancy": 20}, ...]}, ...]`
//! - a map keyed by day name: `{"Monday": {"data": [0, 0, 15, ...]}}`
//!
//! Day entries may be the hour list itself or wrap it in `data`; hour entries
//! may be bare numbers or `{hour?, occupancy | occupancyPercent}` objects.
//! Anything that does not fit degrades to `None`.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::work_hours::{to_region_time, DayOfWeek};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Busyness {
    /// Occupancy estimate, clamped to `0..=100`.
    pub percentage: u8,
    pub label: String,
}

/// Resolve the occupancy for the current Bali hour.
pub fn resolve_busyness(
    histogram: Option<&Value>,
    live_text: Option<&str>,
    now: DateTime<Utc>,
) -> Option<Busyness> {
    let local = to_region_time(now);
    let day = DayOfWeek::from(local.weekday());
    let hour = local.hour();

    let day_entry = day_entry(histogram?, day)?;
    let percentage = hour_occupancy(day_entry, hour)?;

    let label = match live_text.map(str::trim).filter(|t| !t.is_empty()) {
        Some(text) => text.to_string(),
        None => format!("Usually {percentage}% busy at this time"),
    };
    Some(Busyness { percentage, label })
}

fn day_entry(histogram: &Value, day: DayOfWeek) -> Option<&Value> {
    match histogram {
        Value::Array(days) => days.get(day.index_from_monday()),
        Value::Object(days) => days
            .iter()
            .find(|(name, _)| DayOfWeek::parse_name(name) == Some(day))
            .map(|(_, entry)| entry),
        _ => None,
    }
}

fn hour_occupancy(day_entry: &Value, hour: u32) -> Option<u8> {
    let hours = match day_entry {
        Value::Array(hours) => hours,
        Value::Object(obj) => obj.get("data")?.as_array()?,
        _ => return None,
    };

    let keyed = hours.iter().any(|h| h.get("hour").is_some());
    let entry = if keyed {
        hours
            .iter()
            .find(|h| h.get("hour").and_then(Value::as_u64) == Some(u64::from(hour)))?
    } else {
        hours.get(hour as usize)?
    };

    let raw = match entry {
        Value::Number(n) => n.as_f64()?,
        Value::Object(obj) => obj
            .get("occupancy")
            .or_else(|| obj.get("occupancyPercent"))?
            .as_f64()?,
        _ => return None,
    };
    if !raw.is_finite() {
        return None;
    }
    Some(raw.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::work_hours::region_offset;
    use chrono::TimeZone;
    use serde_json::json;

    /// 2024-01-03 is a Wednesday.
    fn wednesday_local(hour: u32) -> DateTime<Utc> {
        region_offset()
            .with_ymd_and_hms(2024, 1, 3, hour, 15, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn array_histogram() -> Value {
        let wednesday = json!({
            "data": [
                { "hour": 13, "occupancy": 40 },
                { "hour": 14, "occupancy": 65 }
            ]
        });
        json!([{ "data": [] }, { "data": [] }, wednesday])
    }

    #[test]
    fn array_shape_uses_monday_index_and_hour_key() {
        let b = resolve_busyness(Some(&array_histogram()), None, wednesday_local(14)).unwrap();
        assert_eq!(b.percentage, 65);
        assert_eq!(b.label, "Usually 65% busy at this time");
    }

    #[test]
    fn live_text_overrides_label() {
        let b = resolve_busyness(
            Some(&array_histogram()),
            Some("Busier than usual"),
            wednesday_local(13),
        )
        .unwrap();
        assert_eq!(b.percentage, 40);
        assert_eq!(b.label, "Busier than usual");
    }

    #[test]
    fn map_shape_with_bare_numbers() {
        let mut data = vec![0; 24];
        data[9] = 30;
        let histogram = json!({ "Среда": { "data": data } });
        let b = resolve_busyness(Some(&histogram), None, wednesday_local(9)).unwrap();
        assert_eq!(b.percentage, 30);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut data = vec![json!(0); 24];
        data[10] = json!({ "occupancyPercent": 130 });
        let histogram = json!({ "wednesday": data });
        let b = resolve_busyness(Some(&histogram), None, wednesday_local(10)).unwrap();
        assert_eq!(b.percentage, 100);
    }

    #[test]
    fn missing_hour_or_histogram_is_none() {
        assert_eq!(resolve_busyness(None, Some("live"), wednesday_local(9)), None);
        assert_eq!(
            resolve_busyness(Some(&array_histogram()), None, wednesday_local(3)),
            None
        );
    }

    #[test]
    fn malformed_structures_degrade_to_none() {
        let now = wednesday_local(9);
        for histogram in [
            json!("busy"),
            json!([1, 2, 3]),
            json!({ "Wednesday": "lots" }),
            json!({ "Wednesday": { "data": "x" } }),
            json!({ "Wednesday": [null, null, null, null, null, null, null, null, null, "x"] }),
        ] {
            assert_eq!(resolve_busyness(Some(&histogram), None, now), None);
        }
    }
}
