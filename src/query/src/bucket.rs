use chrono::DateTime;
use chrono_tz::Tz;
use common::query::time::date_trunc;
use common::query::time::format_datetime;
use common::query::TimeGranularity;
use common::types::format_number;
use common::types::PROPERTY_VALUE_NONE;
use common::PropValue;

const SEPARATOR: &str = " - ";

/// Numeric value of a property, numeric strings included.
pub fn numeric_value(value: &PropValue) -> Option<f64> {
    match value {
        PropValue::Number(v) => Some(*v),
        PropValue::String(v) => v.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn format_bound(v: f64) -> String {
    let rounded = (v * 100.0).round() / 100.0;
    format_number(rounded)
}

/// Equal width buckets over the observed `[min, max]` range.
#[derive(Clone, Debug, PartialEq)]
pub struct NumericBuckets {
    min: f64,
    max: f64,
    width: f64,
    count: usize,
}

impl NumericBuckets {
    /// None when no numeric value was observed.
    pub fn from_values(values: impl IntoIterator<Item = f64>, count: usize) -> Option<Self> {
        let (min, max) = values
            .into_iter()
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((min, max)) => Some((min.min(v), max.max(v))),
            })?;
        let count = count.max(1);

        Some(Self {
            min,
            max,
            width: (max - min) / count as f64,
            count,
        })
    }

    pub fn index(&self, v: f64) -> usize {
        if self.width == 0.0 {
            return 0;
        }

        let idx = ((v - self.min) / self.width).floor();
        if idx < 0.0 {
            0
        } else {
            (idx as usize).min(self.count - 1)
        }
    }

    pub fn bounds(&self, idx: usize) -> (f64, f64) {
        if self.width == 0.0 {
            return (self.min, self.max);
        }

        let low = self.min + self.width * idx as f64;
        let high = if idx + 1 >= self.count {
            self.max
        } else {
            self.min + self.width * (idx + 1) as f64
        };
        (low, high)
    }

    /// `"low - high"`, collapsed to `"low"` for a degenerate range.
    pub fn label(&self, v: f64) -> String {
        let (low, high) = self.bounds(self.index(v));
        let (low, high) = (format_bound(low), format_bound(high));
        if low == high {
            low
        } else {
            format!("{low}{SEPARATOR}{high}")
        }
    }

    /// Label of a property value, absent and non-numeric values land in `$none`.
    pub fn label_value(&self, value: &PropValue) -> String {
        match numeric_value(value) {
            Some(v) => self.label(v),
            None => PROPERTY_VALUE_NONE.to_string(),
        }
    }
}

fn parse_datetime(value: &PropValue) -> Option<i64> {
    match value {
        PropValue::Number(v) => Some(*v as i64),
        PropValue::String(v) => {
            if let Ok(ts) = v.trim().parse::<i64>() {
                return Some(ts);
            }
            DateTime::parse_from_rfc3339(v.trim())
                .ok()
                .map(|dt| dt.timestamp())
        }
        _ => None,
    }
}

/// ISO-8601 label of a datetime property truncated to `granularity`.
pub fn datetime_label(value: &PropValue, granularity: Option<TimeGranularity>, tz: &Tz) -> String {
    let Some(ts) = parse_datetime(value) else {
        return PROPERTY_VALUE_NONE.to_string();
    };

    let dt = match granularity {
        Some(granularity) => date_trunc(granularity, ts, tz).ok(),
        None => chrono::TimeZone::timestamp_opt(tz, ts, 0).single(),
    };
    match dt {
        Some(dt) => format_datetime(&dt),
        None => PROPERTY_VALUE_NONE.to_string(),
    }
}
