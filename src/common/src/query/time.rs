use chrono::DateTime;
use chrono::Datelike;
use chrono::Duration;
use chrono::Months;
use chrono::NaiveDate;
use chrono::NaiveDateTime;
use chrono::TimeZone;
use chrono::Timelike;
use chrono::Utc;
use chrono_tz::Tz;
use serde::Deserialize;
use serde::Serialize;

use crate::error::CommonError;
use crate::error::Result;

/// Limit of datetime buckets of one time series.
pub const MAX_TIME_BUCKETS: usize = 10_000;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimeGranularity {
    #[serde(rename = "hour")]
    Hour,
    #[serde(rename = "date", alias = "day")]
    Date,
    #[serde(rename = "week")]
    Week,
    #[serde(rename = "month")]
    Month,
    #[serde(rename = "quarter")]
    Quarter,
}

impl TimeGranularity {
    /// Start of the bucket following `cur`, `None` past the representable range.
    pub fn next(&self, cur: NaiveDateTime) -> Option<NaiveDateTime> {
        match self {
            TimeGranularity::Hour => cur.checked_add_signed(Duration::hours(1)),
            TimeGranularity::Date => cur.checked_add_signed(Duration::days(1)),
            TimeGranularity::Week => cur.checked_add_signed(Duration::weeks(1)),
            TimeGranularity::Month => cur.checked_add_months(Months::new(1)),
            TimeGranularity::Quarter => cur.checked_add_months(Months::new(3)),
        }
    }

    // shortest possible bucket, a DST hour off for day based ones
    fn min_seconds(&self) -> i64 {
        match self {
            TimeGranularity::Hour => 3600,
            TimeGranularity::Date => 23 * 3600,
            TimeGranularity::Week => 7 * 86400 - 3600,
            TimeGranularity::Month => 28 * 86400 - 3600,
            TimeGranularity::Quarter => 89 * 86400 - 3600,
        }
    }

    /// Upper bound of the number of buckets covering `[from, to)`.
    pub fn max_buckets(&self, from: i64, to: i64) -> u64 {
        let span = to.saturating_sub(from).max(0) as u64;
        span / self.min_seconds() as u64 + 2
    }

    pub fn as_str(&self) -> &str {
        match self {
            TimeGranularity::Hour => "hour",
            TimeGranularity::Date => "date",
            TimeGranularity::Week => "week",
            TimeGranularity::Month => "month",
            TimeGranularity::Quarter => "quarter",
        }
    }
}

fn to_local(ts: i64, tz: &Tz) -> Result<DateTime<Tz>> {
    Utc.timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.with_timezone(tz))
        .ok_or(CommonError::TimestampOutOfRange(ts))
}

fn from_local(naive: NaiveDateTime, tz: &Tz) -> DateTime<Tz> {
    // midnight can fall into a DST gap, the instant is then taken as if it were UTC
    tz.from_local_datetime(&naive)
        .earliest()
        .unwrap_or_else(|| tz.from_utc_datetime(&naive))
}

fn trunc_naive(granularity: TimeGranularity, value: NaiveDateTime) -> NaiveDateTime {
    let date = value.date();
    let date = match granularity {
        TimeGranularity::Hour => {
            return date
                .and_hms_opt(value.hour(), 0, 0)
                .unwrap_or(value);
        }
        TimeGranularity::Date => date,
        TimeGranularity::Week => {
            date - chrono::Duration::days(date.weekday().num_days_from_sunday() as i64)
        }
        TimeGranularity::Month => date.with_day(1).unwrap_or(date),
        TimeGranularity::Quarter => {
            let month = (date.month0() / 3) * 3 + 1;
            NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
        }
    };

    date.and_time(chrono::NaiveTime::MIN)
}

/// Truncates a unix timestamp to the start of its bucket in `tz`.
///
/// Weeks start on Sunday 00:00, quarters on Jan/Apr/Jul/Oct 1.
pub fn date_trunc(granularity: TimeGranularity, ts: i64, tz: &Tz) -> Result<DateTime<Tz>> {
    let local = to_local(ts, tz)?;
    Ok(from_local(trunc_naive(granularity, local.naive_local()), tz))
}

/// Bucket starts covering `[from, to)`, in ascending order.
///
/// Fails with an invalid query error past [MAX_TIME_BUCKETS] buckets.
pub fn time_buckets(
    granularity: TimeGranularity,
    from: i64,
    to: i64,
    tz: &Tz,
) -> Result<Vec<DateTime<Tz>>> {
    let start = to_local(from, tz)?;
    let mut cur = trunc_naive(granularity, start.naive_local());
    let mut buckets = vec![];
    loop {
        let dt = from_local(cur, tz);
        if dt.timestamp() >= to {
            break;
        }
        if buckets.len() >= MAX_TIME_BUCKETS {
            return Err(CommonError::invalid_query(format!(
                "more than {MAX_TIME_BUCKETS} {} buckets",
                granularity.as_str()
            )));
        }
        buckets.push(dt);
        cur = granularity
            .next(cur)
            .ok_or_else(|| CommonError::invalid_query("time range out of bounds"))?;
    }

    Ok(buckets)
}

pub fn format_datetime(dt: &DateTime<Tz>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

#[cfg(test)]
mod tests {
    use chrono_tz::America::New_York;
    use chrono_tz::Asia::Kolkata;
    use rstest::rstest;

    use super::*;

    // 2021-01-06T10:30:00Z, a Wednesday
    const TS: i64 = 1609929000;

    #[rstest]
    #[case(TimeGranularity::Hour, "2021-01-06T10:00:00+00:00")]
    #[case(TimeGranularity::Date, "2021-01-06T00:00:00+00:00")]
    #[case(TimeGranularity::Week, "2021-01-03T00:00:00+00:00")]
    #[case(TimeGranularity::Month, "2021-01-01T00:00:00+00:00")]
    #[case(TimeGranularity::Quarter, "2021-01-01T00:00:00+00:00")]
    fn test_date_trunc_utc(#[case] granularity: TimeGranularity, #[case] exp: &str) {
        let dt = date_trunc(granularity, TS, &Tz::UTC).unwrap();
        assert_eq!(format_datetime(&dt), exp);
    }

    #[test]
    fn test_quarter() {
        // 2021-08-15T12:00:00Z
        let dt = date_trunc(TimeGranularity::Quarter, 1629028800, &Tz::UTC).unwrap();
        assert_eq!(format_datetime(&dt), "2021-07-01T00:00:00+00:00");
    }

    #[test]
    fn test_date_trunc_uses_timezone() {
        // 2021-01-06T20:00:00Z is already Jan 7 in Kolkata
        let dt = date_trunc(TimeGranularity::Date, 1609963200, &Kolkata).unwrap();
        assert_eq!(format_datetime(&dt), "2021-01-07T00:00:00+05:30");

        let dt = date_trunc(TimeGranularity::Date, TS, &New_York).unwrap();
        assert_eq!(format_datetime(&dt), "2021-01-06T00:00:00-05:00");
    }

    #[test]
    fn test_time_buckets() {
        // 2021-01-01 .. 2021-01-04
        let buckets = time_buckets(TimeGranularity::Date, 1609459200, 1609718400, &Tz::UTC)
            .unwrap()
            .iter()
            .map(format_datetime)
            .collect::<Vec<_>>();
        assert_eq!(buckets, vec![
            "2021-01-01T00:00:00+00:00",
            "2021-01-02T00:00:00+00:00",
            "2021-01-03T00:00:00+00:00",
        ]);
    }

    #[test]
    fn test_week_buckets_start_before_range() {
        // Wednesday 2021-01-06 .. Wednesday 2021-01-13
        let buckets = time_buckets(TimeGranularity::Week, TS, TS + 7 * 86400, &Tz::UTC)
            .unwrap()
            .iter()
            .map(format_datetime)
            .collect::<Vec<_>>();
        assert_eq!(buckets, vec![
            "2021-01-03T00:00:00+00:00",
            "2021-01-10T00:00:00+00:00",
        ]);
    }

    #[test]
    fn test_quarter_buckets() {
        // 2021-02-01 .. 2021-12-01
        let buckets = time_buckets(TimeGranularity::Quarter, 1612137600, 1638316800, &Tz::UTC)
            .unwrap()
            .iter()
            .map(format_datetime)
            .collect::<Vec<_>>();
        assert_eq!(buckets, vec![
            "2021-01-01T00:00:00+00:00",
            "2021-04-01T00:00:00+00:00",
            "2021-07-01T00:00:00+00:00",
            "2021-10-01T00:00:00+00:00",
        ]);
    }

    #[test]
    fn test_too_many_buckets() {
        let to = TS + (MAX_TIME_BUCKETS as i64 + 1) * 3600;
        let err = time_buckets(TimeGranularity::Hour, TS, to, &Tz::UTC).unwrap_err();
        assert!(matches!(err, CommonError::InvalidQuery(_)));
    }

    #[test]
    fn test_stepping_past_the_last_date() {
        let last = Utc
            .from_utc_datetime(&NaiveDate::MAX.and_time(chrono::NaiveTime::MIN))
            .timestamp();
        let err = time_buckets(TimeGranularity::Quarter, last, i64::MAX, &Tz::UTC).unwrap_err();
        assert!(matches!(err, CommonError::InvalidQuery(_)));
    }

    #[test]
    fn test_max_buckets() {
        assert_eq!(TimeGranularity::Date.max_buckets(0, 3 * 86400), 5);
        assert_eq!(TimeGranularity::Hour.max_buckets(10, 0), 2);
    }
}
