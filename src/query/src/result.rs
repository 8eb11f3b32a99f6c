use std::fmt;

use common::query::ALIAS_AGGREGATE;
use common::query::ALIAS_DATETIME;
use common::query::ALIAS_EVENT_INDEX;
use common::query::ALIAS_EVENT_NAME;
use common::query::CONVERSION_OVERALL;
use common::query::CONVERSION_PREFIX;
use common::query::STEP_PREFIX;
use common::query::STEP_TIME_SUFFIX;
use serde::Deserialize;
use serde::Serialize;

/// One result cell.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum Value {
    Integer(i64),
    Float(f64),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct QueryResult {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResultMeta>,
}

/// Secondary tables computed along with the result.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ResultMeta {
    pub metrics: Vec<HeaderRows>,
}

impl ResultMeta {
    pub fn metric(&self, title: &str) -> Option<&HeaderRows> {
        self.metrics.iter().find(|m| m.title == title)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct HeaderRows {
    pub title: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Looks up a cell by row index and header.
    pub fn cell(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name)
            .and_then(|col| self.rows.get(row).and_then(|r| r.get(col)))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct ResultGroup {
    #[serde(rename = "result_group")]
    pub results: Vec<QueryResult>,
}

/// Column layout of events results:
/// `[event_index] + breakdowns + [datetime] + [event_name] + aggregate`.
pub struct Layout {
    pub each: bool,
    pub breakdowns: Vec<String>,
    pub datetime: bool,
}

impl Layout {
    pub fn headers(&self) -> Vec<String> {
        let mut headers = Vec::with_capacity(self.breakdowns.len() + 4);
        if self.each {
            headers.push(ALIAS_EVENT_INDEX.to_string());
        }
        headers.extend(self.breakdowns.iter().cloned());
        if self.datetime {
            headers.push(ALIAS_DATETIME.to_string());
        }
        if self.each {
            headers.push(ALIAS_EVENT_NAME.to_string());
        }
        headers.push(ALIAS_AGGREGATE.to_string());

        headers
    }

    pub fn row(
        &self,
        step: Option<(usize, &str)>,
        labels: &[String],
        datetime: Option<String>,
        aggregate: f64,
    ) -> Vec<Value> {
        let mut row = Vec::with_capacity(labels.len() + 4);
        if let (true, Some((idx, _))) = (self.each, step) {
            row.push(Value::Integer(idx as i64));
        }
        row.extend(labels.iter().map(|l| Value::String(l.clone())));
        if let (true, Some(dt)) = (self.datetime, datetime) {
            row.push(Value::String(dt));
        }
        if let (true, Some((_, name))) = (self.each, step) {
            row.push(Value::from(name));
        }
        row.push(Value::Float(aggregate));

        row
    }
}

/// Column layout of funnel results:
/// `breakdowns + step_0 + (step_k + conversion_step_{k-1}_step_k)... + conversion_overall`.
pub struct FunnelLayout {
    pub breakdowns: Vec<String>,
    pub steps: usize,
}

impl FunnelLayout {
    pub fn headers(&self) -> Vec<String> {
        let mut headers = self.breakdowns.clone();
        for step in 0..self.steps {
            headers.push(format!("{STEP_PREFIX}{step}"));
            if step > 0 {
                headers.push(format!(
                    "{CONVERSION_PREFIX}{STEP_PREFIX}{}_{STEP_PREFIX}{step}",
                    step - 1
                ));
            }
        }
        headers.push(CONVERSION_OVERALL.to_string());

        headers
    }

    /// Headers of the step time table: `breakdowns + step_{k-1}_{k}_time...`.
    pub fn step_time_headers(&self) -> Vec<String> {
        let mut headers = self.breakdowns.clone();
        for step in 1..self.steps {
            headers.push(format!("{STEP_PREFIX}{}_{step}{STEP_TIME_SUFFIX}", step - 1));
        }

        headers
    }

    /// Average seconds between adjacent steps, from the summed gaps and the number of
    /// identities reaching each step.
    pub fn step_time_row(&self, labels: &[String], counts: &[u64], gaps: &[i64]) -> Vec<Value> {
        let mut row = labels
            .iter()
            .map(|l| Value::String(l.clone()))
            .collect::<Vec<_>>();
        for (step, gap) in gaps.iter().enumerate() {
            let reached = counts.get(step + 1).cloned().unwrap_or_default();
            let avg = if reached == 0 {
                0.0
            } else {
                (*gap as f64 / reached as f64 * 100.0).round() / 100.0
            };
            row.push(Value::Float(avg));
        }

        row
    }

    pub fn row(&self, labels: &[String], counts: &[u64]) -> Vec<Value> {
        let mut row = labels
            .iter()
            .map(|l| Value::String(l.clone()))
            .collect::<Vec<_>>();
        for (step, count) in counts.iter().enumerate() {
            row.push(Value::Integer(*count as i64));
            if step > 0 {
                row.push(Value::String(conversion(counts[step - 1], *count)));
            }
        }
        let first = counts.first().cloned().unwrap_or_default();
        let last = counts.last().cloned().unwrap_or_default();
        row.push(Value::String(conversion(first, last)));

        row
    }
}

/// Formats a conversion percentage with one fractional digit, 0 when `prev` is 0.
pub fn conversion(prev: u64, cur: u64) -> String {
    let pct = if prev == 0 {
        0.0
    } else {
        cur as f64 / prev as f64 * 100.0
    };
    format!("{pct:.1}")
}
