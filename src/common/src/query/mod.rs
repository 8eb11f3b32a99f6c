pub mod time;

use std::fmt;
use std::fmt::Display;

use chrono_tz::Tz;
use serde::Deserialize;
use serde::Serialize;

use crate::error::CommonError;
use crate::error::Result;
use crate::types::PROPERTY_VALUE_NONE;

pub use time::TimeGranularity;

pub const ALIAS_EVENT_INDEX: &str = "event_index";
pub const ALIAS_EVENT_NAME: &str = "event_name";
pub const ALIAS_DATETIME: &str = "datetime";
pub const ALIAS_AGGREGATE: &str = "aggregate";
pub const STEP_PREFIX: &str = "step_";
pub const CONVERSION_PREFIX: &str = "conversion_";
pub const CONVERSION_OVERALL: &str = "conversion_overall";
pub const STEP_TIME_SUFFIX: &str = "_time";
/// Title of the funnel meta table with average times between steps.
pub const META_STEP_TIME_INFO: &str = "MetaStepTimeInfo";
/// Breakdown value of the funnel totals row.
pub const NO_GROUP: &str = "$no_group";
/// Breakdown event name meaning "latest user properties, regardless of step".
pub const EVENT_NAME_PRESENT: &str = "$present";
pub const DEFAULT_TIMEZONE: &str = "UTC";
pub const MAX_FUNNEL_STEPS: usize = 10;
/// Accepted query window bounds, 0001-01-01T00:00:00Z and 10000-01-01T00:00:00Z.
pub const MIN_TIMESTAMP: i64 = -62135596800;
pub const MAX_TIMESTAMP: i64 = 253402300800;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QueryClass {
    #[serde(rename = "events", alias = "insights")]
    Events,
    #[serde(rename = "funnel")]
    Funnel,
}

impl Display for QueryClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryClass::Events => write!(f, "events"),
            QueryClass::Funnel => write!(f, "funnel"),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    EventsOccurrence,
    UniqueUsers,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventsCondition {
    #[serde(rename = "any_given_event")]
    Any,
    #[serde(rename = "all_given_event")]
    All,
    #[serde(rename = "each_given_event")]
    Each,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyEntity {
    #[serde(rename = "event")]
    Event,
    /// User properties as of the event.
    #[serde(rename = "user")]
    User,
    /// Latest user properties of the identity.
    #[serde(rename = "user_g")]
    UserGlobal,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    Categorical,
    Numerical,
    Datetime,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum Operator {
    Equals,
    NotEqual,
    Contains,
    NotContains,
    GreaterThan,
    LesserThan,
    InList,
    NotInList,
}

impl Operator {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Operator::GreaterThan | Operator::LesserThan)
    }

    pub fn is_list(&self) -> bool {
        matches!(self, Operator::InList | Operator::NotInList)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LogicalOp {
    #[default]
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum GroupByType {
    #[default]
    WithBuckets,
    RawValues,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryProperty {
    #[serde(rename = "en")]
    pub entity: PropertyEntity,
    #[serde(rename = "pr")]
    pub property: String,
    #[serde(rename = "op")]
    pub operator: Operator,
    #[serde(rename = "ty", default)]
    pub typ: PropertyType,
    #[serde(rename = "va")]
    pub value: String,
    #[serde(rename = "lop", default)]
    pub logical_op: LogicalOp,
}

impl QueryProperty {
    pub fn is_value_none(&self) -> bool {
        self.value == PROPERTY_VALUE_NONE
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryEventWithProperties {
    #[serde(rename = "na")]
    pub name: String,
    #[serde(rename = "pr", default)]
    pub properties: Vec<QueryProperty>,
}

impl QueryEventWithProperties {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            properties: vec![],
        }
    }
}

#[serde_with::skip_serializing_none]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryGroupByProperty {
    #[serde(rename = "en")]
    pub entity: PropertyEntity,
    #[serde(rename = "pr")]
    pub property: String,
    #[serde(rename = "pty", default)]
    pub typ: PropertyType,
    /// Step name, [EVENT_NAME_PRESENT] or empty for user properties.
    #[serde(rename = "ena", default)]
    pub event_name: String,
    /// 1-based step index, disambiguates repeated step names.
    #[serde(rename = "eni", default)]
    pub event_index: Option<usize>,
    #[serde(rename = "grn", default)]
    pub granularity: Option<TimeGranularity>,
    #[serde(rename = "gbty", default)]
    pub group_by_type: Option<GroupByType>,
}

impl QueryGroupByProperty {
    /// True when the value is read from the latest properties of the identity.
    pub fn is_present(&self) -> bool {
        self.entity == PropertyEntity::UserGlobal
            || (self.entity == PropertyEntity::User
                && (self.event_name.is_empty() || self.event_name == EVENT_NAME_PRESENT))
    }

    pub fn is_bucketed(&self) -> bool {
        self.typ == PropertyType::Numerical
            && self.group_by_type.unwrap_or_default() == GroupByType::WithBuckets
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Query {
    #[serde(rename = "cl")]
    pub class: QueryClass,
    #[serde(rename = "ty")]
    pub typ: QueryType,
    #[serde(rename = "ec")]
    pub condition: EventsCondition,
    #[serde(rename = "ewp")]
    pub events: Vec<QueryEventWithProperties>,
    #[serde(rename = "gup", default)]
    pub global_properties: Vec<QueryProperty>,
    #[serde(rename = "gbp", default)]
    pub group_by: Vec<QueryGroupByProperty>,
    #[serde(rename = "gbt", default)]
    pub group_by_timestamp: Option<TimeGranularity>,
    #[serde(rename = "tz", default = "default_timezone")]
    pub timezone: String,
    #[serde(rename = "fr")]
    pub from: i64,
    #[serde(rename = "to")]
    pub to: i64,
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct QueryGroup {
    #[serde(rename = "query_group")]
    pub queries: Vec<Query>,
}

impl Query {
    pub fn tz(&self) -> Result<Tz> {
        if self.timezone.is_empty() {
            return Ok(Tz::UTC);
        }

        self.timezone
            .parse::<Tz>()
            .map_err(|_| CommonError::UnknownTimezone(self.timezone.clone()))
    }

    /// Index of the step a breakdown is bound to, None for identity level breakdowns.
    pub fn group_by_step(&self, gbp: &QueryGroupByProperty) -> Option<usize> {
        if gbp.is_present() {
            return None;
        }

        match gbp.event_index {
            Some(idx) => idx.checked_sub(1),
            None => self.events.iter().position(|e| e.name == gbp.event_name),
        }
    }

    /// Rejects malformed queries before any data is read.
    pub fn validate(&self) -> Result<()> {
        if self.events.is_empty() {
            return Err(CommonError::invalid_query("no events given"));
        }

        if self.class == QueryClass::Funnel {
            if self.typ != QueryType::UniqueUsers {
                return Err(CommonError::invalid_query(
                    "funnel on events occurrence is not supported",
                ));
            }
            if self.events.len() > MAX_FUNNEL_STEPS {
                return Err(CommonError::invalid_query("Max funnel steps exceeded"));
            }
            if self.group_by_timestamp.is_some() {
                return Err(CommonError::invalid_query(
                    "group by timestamp is not supported for funnel queries",
                ));
            }
        }

        if self.from >= self.to {
            return Err(CommonError::invalid_query(format!(
                "invalid time range [{}, {})",
                self.from, self.to
            )));
        }
        if self.from < MIN_TIMESTAMP || self.to > MAX_TIMESTAMP {
            return Err(CommonError::invalid_query(format!(
                "time range [{}, {}) out of bounds",
                self.from, self.to
            )));
        }
        if let Some(granularity) = self.group_by_timestamp {
            if granularity.max_buckets(self.from, self.to) > time::MAX_TIME_BUCKETS as u64 {
                return Err(CommonError::invalid_query(format!(
                    "time range too wide for {} granularity",
                    granularity.as_str()
                )));
            }
        }
        self.tz().map_err(|err| CommonError::invalid_query(err.to_string()))?;

        for (idx, event) in self.events.iter().enumerate() {
            if event.name.is_empty() {
                return Err(CommonError::invalid_query(format!(
                    "step {idx}: empty event name"
                )));
            }
            for prop in event.properties.iter() {
                validate_property(prop)
                    .map_err(|msg| CommonError::invalid_query(format!("step {idx} {msg}")))?;
            }
        }

        for prop in self.global_properties.iter() {
            validate_property(prop)
                .map_err(|msg| CommonError::invalid_query(format!("global filter {msg}")))?;
        }

        for gbp in self.group_by.iter() {
            self.validate_group_by(gbp)?;
        }

        Ok(())
    }

    fn validate_group_by(&self, gbp: &QueryGroupByProperty) -> Result<()> {
        if gbp.property.is_empty() {
            return Err(CommonError::invalid_query("group by: empty property name"));
        }

        if gbp.entity == PropertyEntity::Event && gbp.event_name.is_empty() {
            return Err(CommonError::invalid_query(format!(
                "group by property {:?}: event property without event name",
                gbp.property
            )));
        }

        if gbp.is_present() {
            return Ok(());
        }

        match gbp.event_index {
            Some(idx) => {
                if idx == 0 || idx > self.events.len() {
                    return Err(CommonError::invalid_query(format!(
                        "group by property {:?}: event index {idx} out of range",
                        gbp.property
                    )));
                }
                if self.events[idx - 1].name != gbp.event_name {
                    return Err(CommonError::invalid_query(format!(
                        "group by property {:?}: event index {idx} is not {:?}",
                        gbp.property, gbp.event_name
                    )));
                }
            }
            None => {
                if !self.events.iter().any(|e| e.name == gbp.event_name) {
                    return Err(CommonError::invalid_query(format!(
                        "group by property {:?}: unknown event {:?}",
                        gbp.property, gbp.event_name
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_property(prop: &QueryProperty) -> std::result::Result<(), String> {
    if prop.property.is_empty() {
        return Err("property: empty name".to_string());
    }

    if prop.is_value_none() && !matches!(prop.operator, Operator::Equals | Operator::NotEqual) {
        return Err(format!(
            "property {:?}: {PROPERTY_VALUE_NONE} is only supported with equals and notEqual",
            prop.property
        ));
    }

    if prop.operator.is_numeric() && prop.value.trim().parse::<f64>().is_err() {
        return Err(format!(
            "property {:?}: numeric operator requires a number",
            prop.property
        ));
    }

    if prop.operator.is_list() && prop.value.is_empty() {
        return Err(format!("property {:?}: empty list reference", prop.property));
    }

    Ok(())
}

/// Splits properties into OR-groups joined by AND.
///
/// A new group starts at every property with `AND` except the first one, `OR` joins the
/// current group: `a AND b OR c AND d` is `a AND (b OR c) AND d`.
pub fn group_properties(props: &[QueryProperty]) -> Vec<Vec<&QueryProperty>> {
    let mut groups: Vec<Vec<&QueryProperty>> = Vec::new();
    for (idx, prop) in props.iter().enumerate() {
        match groups.last_mut() {
            Some(group) if idx > 0 && prop.logical_op == LogicalOp::Or => group.push(prop),
            _ => groups.push(vec![prop]),
        }
    }

    groups
}
