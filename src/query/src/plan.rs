use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use ahash::AHashSet;
use chrono_tz::Tz;
use common::query::PropertyEntity;
use common::query::PropertyType;
use common::query::Query;
use common::query::QueryGroupByProperty;
use common::query::QueryProperty;
use common::query::TimeGranularity;
use common::types::PROPERTY_IDENTIFIED_USER_ID;
use common::EventNameId;
use common::PropValue;
use metadata::error::MetadataError;
use metadata::MetadataProvider;
use storage::Event;
use storage::Store;
use tracing::debug;

use crate::bucket::datetime_label;
use crate::bucket::numeric_value;
use crate::bucket::NumericBuckets;
use crate::error::QueryError;
use crate::filter::Filter;
use crate::filter::Row;
use crate::identity::Identities;
use crate::identity::IdentityKey;
use crate::Context;
use crate::Result;

pub struct Step {
    pub name: String,
    /// None when the name is unknown, such a step matches nothing.
    pub event_name_id: Option<EventNameId>,
    pub filter: Filter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BreakdownSource {
    /// Latest properties of the identity.
    Present,
    IdentifiedUser,
    /// Event (or user as of event) properties of the step with this index.
    Step(usize),
}

pub struct Breakdown {
    pub property: String,
    pub entity: PropertyEntity,
    pub source: BreakdownSource,
    pub typ: PropertyType,
    pub bucketed: bool,
    pub granularity: Option<TimeGranularity>,
}

impl Breakdown {
    fn new(query: &Query, gbp: &QueryGroupByProperty) -> Result<Self> {
        let source = if gbp.property == PROPERTY_IDENTIFIED_USER_ID {
            BreakdownSource::IdentifiedUser
        } else {
            match query.group_by_step(gbp) {
                None if gbp.is_present() => BreakdownSource::Present,
                Some(idx) if idx < query.events.len() => BreakdownSource::Step(idx),
                _ => {
                    return Err(QueryError::InvalidQuery(format!(
                        "group by property {:?}: unknown event {:?}",
                        gbp.property, gbp.event_name
                    )));
                }
            }
        };

        Ok(Self {
            property: gbp.property.clone(),
            entity: gbp.entity,
            source,
            typ: gbp.typ,
            bucketed: gbp.is_bucketed(),
            granularity: gbp.granularity,
        })
    }

    /// Raw value for an event matched at `step`.
    pub fn value(&self, row: &Row, identity: &IdentityKey, step: usize) -> PropValue {
        match self.source {
            BreakdownSource::IdentifiedUser => PropValue::String(identity.to_string()),
            BreakdownSource::Present => row.user_global.get(&self.property).clone(),
            BreakdownSource::Step(idx) if idx == step => {
                row.get(self.entity, &self.property).clone()
            }
            BreakdownSource::Step(_) => PropValue::Absent,
        }
    }

    pub fn label(&self, value: &PropValue, buckets: Option<&NumericBuckets>, tz: &Tz) -> String {
        if self.source == BreakdownSource::IdentifiedUser {
            return value.label();
        }

        match (self.typ, buckets) {
            (PropertyType::Numerical, Some(buckets)) if self.bucketed => buckets.label_value(value),
            (PropertyType::Datetime, _) => datetime_label(value, self.granularity, tz),
            _ => value.label(),
        }
    }
}

/// Compiled query: resolved event names, compiled filters and breakdowns.
pub struct Plan {
    pub steps: Vec<Step>,
    pub global: Filter,
    pub breakdowns: Vec<Breakdown>,
    pub tz: Tz,
}

async fn resolve_lists(
    ctx: &Context,
    md: &MetadataProvider,
    props: impl Iterator<Item = &QueryProperty>,
) -> Result<HashMap<String, Arc<HashSet<String>>>> {
    let mut lists = HashMap::new();
    for prop in props.filter(|p| p.operator.is_list()) {
        if lists.contains_key(&prop.value) {
            continue;
        }

        let values = md
            .lists
            .resolve(ctx.project_id, &prop.value)
            .await
            .map_err(|err| match err {
                MetadataError::NotFound(msg) => QueryError::InvalidQuery(msg),
                err => QueryError::UpstreamUnavailable(err.to_string()),
            })
            .map_err(|err| err.with_context(format!("property {:?}", prop.property)))?;
        lists.insert(prop.value.clone(), values);
    }

    Ok(lists)
}

impl Plan {
    pub async fn try_new(ctx: &Context, md: &MetadataProvider, query: &Query) -> Result<Self> {
        query.validate()?;
        let tz = query.tz()?;

        let all_props = query
            .events
            .iter()
            .flat_map(|e| e.properties.iter())
            .chain(query.global_properties.iter());
        let lists = resolve_lists(ctx, md, all_props).await?;

        let mut steps = Vec::with_capacity(query.events.len());
        for (idx, event) in query.events.iter().enumerate() {
            let event_name_id = match md.event_names.get_by_name(ctx.project_id, &event.name) {
                Ok(e) => Some(e.id),
                Err(MetadataError::NotFound(_)) => {
                    debug!(step = idx, "event name has no data");
                    None
                }
                Err(err) => return Err(err.into()),
            };
            let filter = Filter::try_new(&event.properties, |r| lists.get(r).cloned())
                .map_err(|err| err.with_context(format!("{} step {idx}", query.class)))?;
            steps.push(Step {
                name: event.name.clone(),
                event_name_id,
                filter,
            });
        }

        let global = Filter::try_new(&query.global_properties, |r| lists.get(r).cloned())
            .map_err(|err| err.with_context(format!("{} global filter", query.class)))?;
        let breakdowns = query
            .group_by
            .iter()
            .map(|gbp| Breakdown::new(query, gbp))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            steps,
            global,
            breakdowns,
            tz,
        })
    }

    pub fn step_matches(&self, step: usize, event: &Event, row: &Row) -> bool {
        let step = &self.steps[step];
        step.event_name_id == Some(event.event_name_id)
            && step.filter.matches(row)
            && self.global.matches(row)
    }

    /// Buckets of the numeric breakdowns over the observed values.
    pub fn numeric_buckets<'a>(
        &self,
        values: impl Iterator<Item = &'a [PropValue]> + Clone,
        count: usize,
    ) -> Vec<Option<NumericBuckets>> {
        self.breakdowns
            .iter()
            .enumerate()
            .map(|(idx, b)| {
                if !(b.typ == PropertyType::Numerical && b.bucketed) {
                    return None;
                }
                NumericBuckets::from_values(
                    values.clone().filter_map(|v| numeric_value(&v[idx])),
                    count,
                )
            })
            .collect()
    }

    pub fn labels(&self, values: &[PropValue], buckets: &[Option<NumericBuckets>]) -> Vec<String> {
        self.breakdowns
            .iter()
            .zip(values.iter())
            .zip(buckets.iter())
            .map(|((b, v), buckets)| b.label(v, buckets.as_ref(), &self.tz))
            .collect()
    }
}

/// Events of a query window with their identities.
pub struct Dataset {
    pub events: Vec<Event>,
    /// Identity of each event, same order as `events`.
    pub identities: Vec<IdentityKey>,
    pub users: Identities,
}

impl Dataset {
    pub async fn load(
        ctx: &Context,
        store: &dyn Store,
        plan: &Plan,
        from: i64,
        to: i64,
    ) -> Result<Self> {
        let mut names = plan
            .steps
            .iter()
            .filter_map(|s| s.event_name_id)
            .collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();
        if names.is_empty() {
            return Ok(Dataset {
                events: vec![],
                identities: vec![],
                users: Identities::default(),
            });
        }

        let events = store
            .events(ctx.project_id, from, to, &names)
            .await
            .map_err(|err| QueryError::from(err).with_context("events scan"))?;
        ctx.check()?;

        let user_ids = events
            .iter()
            .map(|e| e.user_id)
            .collect::<AHashSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();
        let users = Identities::load(store, ctx.project_id, &user_ids)
            .await
            .map_err(|err| err.with_context("users scan"))?;
        ctx.check()?;

        let identities = events
            .iter()
            .map(|e| users.canonical_identity(e.user_id))
            .collect();

        Ok(Dataset {
            events,
            identities,
            users,
        })
    }

    pub fn row(&self, idx: usize) -> Row<'_> {
        let event = &self.events[idx];
        let user = match &event.user_properties {
            Some(props) => props,
            None => self.users.user_properties(event.user_id),
        };
        Row {
            event: &event.properties,
            user,
            user_global: self.users.latest_properties(&self.identities[idx]),
        }
    }
}
