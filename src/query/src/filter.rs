use std::collections::HashSet;
use std::sync::Arc;

use common::query::group_properties;
use common::query::Operator;
use common::query::PropertyEntity;
use common::query::QueryProperty;
use common::types::PROPERTY_VALUE_NONE;
use common::PropValue;
use common::Properties;

use crate::error::QueryError;
use crate::Result;

/// Property sources visible to a filter while evaluating one event.
#[derive(Clone, Copy)]
pub struct Row<'a> {
    pub event: &'a Properties,
    /// User properties as of the event.
    pub user: &'a Properties,
    /// Latest user properties of the identity.
    pub user_global: &'a Properties,
}

impl<'a> Row<'a> {
    pub fn get(&self, entity: PropertyEntity, property: &str) -> &'a PropValue {
        match entity {
            PropertyEntity::Event => self.event.get(property),
            PropertyEntity::User => self.user.get(property),
            PropertyEntity::UserGlobal => self.user_global.get(property),
        }
    }
}

#[derive(Clone, Debug)]
enum Predicate {
    IsNone,
    IsNotNone,
    Equals(String),
    NotEqual(String),
    Contains(String),
    NotContains(String),
    GreaterThan(f64),
    LesserThan(f64),
    InList(Arc<HashSet<String>>),
    NotInList(Arc<HashSet<String>>),
}

/// One property condition with its value parsed and list resolved.
#[derive(Clone, Debug)]
pub struct Condition {
    entity: PropertyEntity,
    property: String,
    predicate: Predicate,
}

fn value_eq(value: &PropValue, expected: &str) -> bool {
    match value {
        PropValue::Absent => false,
        PropValue::String(v) => v == expected,
        PropValue::Number(v) => match expected.trim().parse::<f64>() {
            Ok(expected) => *v == expected,
            Err(_) => value.to_string() == expected,
        },
        PropValue::Bool(v) => expected.eq_ignore_ascii_case(if *v { "true" } else { "false" }),
    }
}

fn parse_number(prop: &QueryProperty) -> Result<f64> {
    prop.value.trim().parse::<f64>().map_err(|_| {
        QueryError::InvalidQuery(format!(
            "property {:?}: {:?} operator requires a number",
            prop.property, prop.operator
        ))
    })
}

impl Condition {
    /// Compiles a property condition, `list` holds the resolved values of list operators.
    pub fn try_new(prop: &QueryProperty, list: Option<Arc<HashSet<String>>>) -> Result<Self> {
        let none = prop.value == PROPERTY_VALUE_NONE;
        let predicate = match (prop.operator, none) {
            (Operator::Equals, true) => Predicate::IsNone,
            (Operator::NotEqual, true) => Predicate::IsNotNone,
            (_, true) => {
                return Err(QueryError::InvalidQuery(format!(
                    "property {:?}: {PROPERTY_VALUE_NONE} is not supported with {:?}",
                    prop.property, prop.operator
                )));
            }
            (Operator::Equals, false) => Predicate::Equals(prop.value.clone()),
            (Operator::NotEqual, false) => Predicate::NotEqual(prop.value.clone()),
            (Operator::Contains, false) => Predicate::Contains(prop.value.clone()),
            (Operator::NotContains, false) => Predicate::NotContains(prop.value.clone()),
            (Operator::GreaterThan, false) => Predicate::GreaterThan(parse_number(prop)?),
            (Operator::LesserThan, false) => Predicate::LesserThan(parse_number(prop)?),
            (Operator::InList, false) | (Operator::NotInList, false) => {
                let list = list.ok_or_else(|| {
                    QueryError::Internal(format!("property {:?}: list not resolved", prop.property))
                })?;
                if prop.operator == Operator::InList {
                    Predicate::InList(list)
                } else {
                    Predicate::NotInList(list)
                }
            }
        };

        Ok(Self {
            entity: prop.entity,
            property: prop.property.clone(),
            predicate,
        })
    }

    pub fn property(&self) -> &str {
        &self.property
    }

    pub fn matches_value(&self, value: &PropValue) -> bool {
        match &self.predicate {
            Predicate::IsNone => value.is_none(),
            Predicate::IsNotNone => !value.is_none(),
            Predicate::Equals(v) => value_eq(value, v),
            // negative operators also hold for rows without the property
            Predicate::NotEqual(v) => value.is_none() || !value_eq(value, v),
            Predicate::Contains(v) => !value.is_none() && value.to_string().contains(v.as_str()),
            Predicate::NotContains(v) => {
                value.is_none() || !value.to_string().contains(v.as_str())
            }
            Predicate::GreaterThan(v) => value.as_f64().map(|x| x > *v).unwrap_or(false),
            Predicate::LesserThan(v) => value.as_f64().map(|x| x < *v).unwrap_or(false),
            Predicate::InList(list) => !value.is_none() && list.contains(&value.to_string()),
            Predicate::NotInList(list) => value.is_none() || !list.contains(&value.to_string()),
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.matches_value(row.get(self.entity, &self.property))
    }
}

/// Conjunction of OR-groups of conditions. An empty filter matches everything.
#[derive(Clone, Debug, Default)]
pub struct Filter {
    groups: Vec<Vec<Condition>>,
}

impl Filter {
    /// `resolve` returns the resolved values of a list reference.
    pub fn try_new<F>(props: &[QueryProperty], mut resolve: F) -> Result<Self>
    where F: FnMut(&str) -> Option<Arc<HashSet<String>>> {
        let groups = group_properties(props)
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|prop| {
                        let list = if prop.operator.is_list() {
                            resolve(&prop.value)
                        } else {
                            None
                        };
                        Condition::try_new(prop, list)
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { groups })
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.groups
            .iter()
            .all(|group| group.iter().any(|cond| cond.matches(row)))
    }
}

/// Evaluates a single non-list property condition against an event property map.
pub fn matches(candidate: &Properties, prop: &QueryProperty) -> Result<bool> {
    let cond = Condition::try_new(prop, None)?;
    Ok(cond.matches_value(candidate.get(&prop.property)))
}
