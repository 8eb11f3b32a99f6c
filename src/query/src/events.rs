use std::cmp::Ordering;
use std::collections::BTreeMap;

use ahash::AHashSet;
use common::config;
use common::config::AllOccurrencePolicy;
use common::query::time::date_trunc;
use common::query::time::format_datetime;
use common::query::time::time_buckets;
use common::query::EventsCondition;
use common::query::Query;
use common::query::QueryType;
use common::types::PROPERTY_VALUE_NONE;
use common::PropValue;
use indexmap::IndexMap;
use tracing::debug;

use crate::filter::Row;
use crate::identity::IdentityKey;
use crate::plan::Dataset;
use crate::plan::Plan;
use crate::result::Layout;
use crate::result::QueryResult;
use crate::Context;
use crate::Result;

const CHECK_INTERVAL: usize = 4096;

/// An event counted for a step, with its raw breakdown values.
struct Occurrence {
    event: usize,
    step: usize,
    values: Vec<PropValue>,
}

impl Occurrence {
    fn new(plan: &Plan, data: &Dataset, event: usize, step: usize, row: &Row) -> Self {
        let identity = &data.identities[event];
        Self {
            event,
            step,
            values: plan
                .breakdowns
                .iter()
                .map(|b| b.value(row, identity, step))
                .collect(),
        }
    }
}

enum Acc<'a> {
    Count(u64),
    Unique(AHashSet<&'a IdentityKey>),
}

impl<'a> Acc<'a> {
    fn new(typ: QueryType) -> Self {
        match typ {
            QueryType::EventsOccurrence => Acc::Count(0),
            QueryType::UniqueUsers => Acc::Unique(AHashSet::new()),
        }
    }

    fn add(&mut self, identity: &'a IdentityKey) {
        match self {
            Acc::Count(n) => *n += 1,
            Acc::Unique(set) => {
                set.insert(identity);
            }
        }
    }

    fn value(&self) -> f64 {
        match self {
            Acc::Count(n) => *n as f64,
            Acc::Unique(set) => set.len() as f64,
        }
    }
}

struct GroupAcc<'a> {
    total: Acc<'a>,
    buckets: BTreeMap<i64, Acc<'a>>,
}

impl<'a> GroupAcc<'a> {
    fn new(typ: QueryType) -> Self {
        Self {
            total: Acc::new(typ),
            buckets: BTreeMap::new(),
        }
    }
}

fn step_occurrences(
    ctx: &Context,
    plan: &Plan,
    data: &Dataset,
    step: usize,
) -> Result<Vec<Occurrence>> {
    let mut res = vec![];
    for (idx, event) in data.events.iter().enumerate() {
        if idx % CHECK_INTERVAL == 0 {
            ctx.check()?;
        }
        let row = data.row(idx);
        if plan.step_matches(step, event, &row) {
            res.push(Occurrence::new(plan, data, idx, step, &row));
        }
    }

    Ok(res)
}

// union: every event matching at least one step, counted once for its first matching step
fn any_occurrences(ctx: &Context, plan: &Plan, data: &Dataset) -> Result<Vec<Occurrence>> {
    let mut res = vec![];
    for (idx, event) in data.events.iter().enumerate() {
        if idx % CHECK_INTERVAL == 0 {
            ctx.check()?;
        }
        let row = data.row(idx);
        if let Some(step) = (0..plan.steps.len()).find(|s| plan.step_matches(*s, event, &row)) {
            res.push(Occurrence::new(plan, data, idx, step, &row));
        }
    }

    Ok(res)
}

// intersection: only identities with a match for every step
fn all_occurrences(
    ctx: &Context,
    plan: &Plan,
    data: &Dataset,
    policy: AllOccurrencePolicy,
) -> Result<Vec<Occurrence>> {
    let n = plan.steps.len();
    let mut first_step: Vec<Option<usize>> = Vec::with_capacity(data.events.len());
    let mut firsts: IndexMap<&IdentityKey, Vec<Option<usize>>> = IndexMap::new();
    for (idx, event) in data.events.iter().enumerate() {
        if idx % CHECK_INTERVAL == 0 {
            ctx.check()?;
        }
        let row = data.row(idx);
        let mut first = None;
        for step in 0..n {
            if !plan.step_matches(step, event, &row) {
                continue;
            }
            first.get_or_insert(step);
            let steps = firsts
                .entry(&data.identities[idx])
                .or_insert_with(|| vec![None; n]);
            steps[step].get_or_insert(idx);
        }
        first_step.push(first);
    }

    let qualified = firsts
        .iter()
        .filter(|(_, steps)| steps.iter().all(|s| s.is_some()))
        .map(|(id, _)| *id)
        .collect::<AHashSet<_>>();
    debug!(identities = firsts.len(), qualified = qualified.len(), "all given event");

    let mut res = vec![];
    match policy {
        AllOccurrencePolicy::AllEvents => {
            for (idx, step) in first_step.into_iter().enumerate() {
                if let Some(step) = step {
                    if qualified.contains(&data.identities[idx]) {
                        res.push(Occurrence::new(plan, data, idx, step, &data.row(idx)));
                    }
                }
            }
        }
        AllOccurrencePolicy::FirstMatch => {
            for (id, steps) in firsts.iter() {
                if !qualified.contains(id) {
                    continue;
                }
                for (step, idx) in steps.iter().enumerate() {
                    if let Some(idx) = idx {
                        res.push(Occurrence::new(plan, data, *idx, step, &data.row(*idx)));
                    }
                }
            }
        }
    }

    Ok(res)
}

/// Computes an events (non funnel) query over loaded data.
pub fn aggregate(
    ctx: &Context,
    cfg: &config::Query,
    query: &Query,
    plan: &Plan,
    data: &Dataset,
) -> Result<QueryResult> {
    let sections: Vec<(Option<usize>, Vec<Occurrence>)> = match query.condition {
        EventsCondition::Any => vec![(None, any_occurrences(ctx, plan, data)?)],
        EventsCondition::All => vec![(
            None,
            all_occurrences(ctx, plan, data, cfg.all_occurrence_policy)?,
        )],
        EventsCondition::Each => (0..plan.steps.len())
            .map(|step| Ok((Some(step), step_occurrences(ctx, plan, data, step)?)))
            .collect::<Result<Vec<_>>>()?,
    };

    let buckets = plan.numeric_buckets(
        sections
            .iter()
            .flat_map(|(_, occ)| occ.iter().map(|o| o.values.as_slice())),
        cfg.numeric_buckets,
    );
    let datetimes = match query.group_by_timestamp {
        Some(granularity) => time_buckets(granularity, query.from, query.to, &plan.tz)?,
        None => vec![],
    };

    let layout = Layout {
        each: query.condition == EventsCondition::Each,
        breakdowns: query.group_by.iter().map(|g| g.property.clone()).collect(),
        datetime: query.group_by_timestamp.is_some(),
    };
    let mut rows = vec![];
    for (step, occurrences) in sections {
        ctx.check()?;
        let mut groups: IndexMap<Vec<String>, GroupAcc> = IndexMap::new();
        if step.is_some() && (plan.breakdowns.is_empty() || occurrences.is_empty()) {
            // every step reports a row even without data
            groups.insert(
                vec![PROPERTY_VALUE_NONE.to_string(); plan.breakdowns.len()],
                GroupAcc::new(query.typ),
            );
        }

        for occ in occurrences.iter() {
            let identity = &data.identities[occ.event];
            let group = groups
                .entry(plan.labels(&occ.values, &buckets))
                .or_insert_with(|| GroupAcc::new(query.typ));
            group.total.add(identity);
            if let Some(granularity) = query.group_by_timestamp {
                let ts = date_trunc(granularity, data.events[occ.event].timestamp, &plan.tz)?
                    .timestamp();
                group
                    .buckets
                    .entry(ts)
                    .or_insert_with(|| Acc::new(query.typ))
                    .add(identity);
            }
            debug_assert!(step.map(|s| s == occ.step).unwrap_or(true));
        }

        let mut ordered = groups.iter().collect::<Vec<_>>();
        // stable, ties keep first seen order
        ordered.sort_by(|a, b| {
            b.1.total
                .value()
                .partial_cmp(&a.1.total.value())
                .unwrap_or(Ordering::Equal)
        });

        let step = step.map(|s| (s, plan.steps[s].name.as_str()));
        for (labels, group) in ordered {
            if query.group_by_timestamp.is_none() {
                rows.push(layout.row(step, labels, None, group.total.value()));
                continue;
            }

            for dt in datetimes.iter() {
                let value = group
                    .buckets
                    .get(&dt.timestamp())
                    .map(|acc| acc.value())
                    .unwrap_or(0.0);
                rows.push(layout.row(step, labels, Some(format_datetime(dt)), value));
            }
        }
    }

    rows.truncate(cfg.results_limit);
    Ok(QueryResult {
        headers: layout.headers(),
        rows,
        meta: None,
    })
}
