use std::fmt;
use std::fmt::Display;

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// Filter value and breakdown label for an absent or empty property.
pub const PROPERTY_VALUE_NONE: &str = "$none";
/// Breakdown property that groups rows by canonical identity key.
pub const PROPERTY_IDENTIFIED_USER_ID: &str = "$identified_user_id";

static ABSENT: PropValue = PropValue::Absent;

/// Scalar property value as stored on events and users.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(untagged)]
pub enum PropValue {
    #[default]
    Absent,
    Bool(bool),
    Number(f64),
    String(String),
}

impl PropValue {
    /// Absent or empty string.
    pub fn is_none(&self) -> bool {
        match self {
            PropValue::Absent => true,
            PropValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Breakdown label of the value. `$none` for absent and empty values.
    pub fn label(&self) -> String {
        if self.is_none() {
            return PROPERTY_VALUE_NONE.to_string();
        }

        self.to_string()
    }
}

impl Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Absent => Ok(()),
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::Number(v) => write!(f, "{}", format_number(*v)),
            PropValue::String(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::String(v.to_string())
    }
}

impl From<String> for PropValue {
    fn from(v: String) -> Self {
        PropValue::String(v)
    }
}

impl From<f64> for PropValue {
    fn from(v: f64) -> Self {
        PropValue::Number(v)
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Number(v as f64)
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

/// Formats whole floats without a fractional part: 12.0 -> "12".
pub fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{v}")
    }
}

/// Flat property map with case-insensitive keys.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(from = "IndexMap<String, PropValue>", into = "IndexMap<String, PropValue>")]
pub struct Properties(IndexMap<String, PropValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: &str, value: impl Into<PropValue>) {
        self.0.insert(key.to_lowercase(), value.into());
    }

    pub fn with(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.insert(key, value);
        self
    }

    /// Value under `key`, [PropValue::Absent] when missing.
    pub fn get(&self, key: &str) -> &PropValue {
        self.0.get(&key.to_lowercase()).unwrap_or(&ABSENT)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<IndexMap<String, PropValue>> for Properties {
    fn from(map: IndexMap<String, PropValue>) -> Self {
        Properties(
            map.into_iter()
                .map(|(k, v)| (k.to_lowercase(), v))
                .collect(),
        )
    }
}

impl From<Properties> for IndexMap<String, PropValue> {
    fn from(props: Properties) -> Self {
        props.0
    }
}

impl<K: AsRef<str>, V: Into<PropValue>> FromIterator<(K, V)> for Properties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut props = Properties::new();
        for (k, v) in iter {
            props.insert(k.as_ref(), v);
        }
        props
    }
}
