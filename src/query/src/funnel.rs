use common::config;
use common::query::Query;
use common::query::META_STEP_TIME_INFO;
use common::query::NO_GROUP;
use common::PropValue;
use indexmap::IndexMap;
use tracing::debug;

use crate::identity::IdentityKey;
use crate::plan::BreakdownSource;
use crate::plan::Dataset;
use crate::plan::Plan;
use crate::result::FunnelLayout;
use crate::result::HeaderRows;
use crate::result::QueryResult;
use crate::result::ResultMeta;
use crate::Context;
use crate::Result;

const CHECK_INTERVAL: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Number of steps matched so far, awaiting the step with this index.
    Step(usize),
    Done,
}

/// Ordered step matcher of one identity.
///
/// The only transition is `Step(k) -> Step(k + 1)` (or `Done` after the last step), fired
/// by the first scanned event satisfying step `k`. Repeated or out of order events never
/// reset progress.
#[derive(Debug, Clone)]
pub struct StepMatcher {
    steps: usize,
    state: State,
    matched: Vec<usize>,
}

impl StepMatcher {
    pub fn new(steps: usize) -> Self {
        Self {
            steps,
            state: if steps == 0 {
                State::Done
            } else {
                State::Step(0)
            },
            matched: Vec::with_capacity(steps),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Index of the step awaited next.
    pub fn expects(&self) -> Option<usize> {
        match self.state {
            State::Step(k) => Some(k),
            State::Done => None,
        }
    }

    /// Records `event` as the match of the awaited step.
    pub fn advance(&mut self, event: usize) {
        if let State::Step(k) = self.state {
            self.matched.push(event);
            self.state = if k + 1 == self.steps {
                State::Done
            } else {
                State::Step(k + 1)
            };
        }
    }

    /// Number of steps reached.
    pub fn reached(&self) -> usize {
        self.matched.len()
    }

    /// Matched event of each reached step.
    pub fn matched(&self) -> &[usize] {
        &self.matched
    }
}

struct Conversion<'a> {
    identity: &'a IdentityKey,
    matched: Vec<usize>,
}

fn scan<'a>(ctx: &Context, plan: &Plan, data: &'a Dataset) -> Result<Vec<Conversion<'a>>> {
    // events are scanned by timestamp, insertion order breaks ties
    let mut per_identity: IndexMap<&IdentityKey, Vec<usize>> = IndexMap::new();
    for (idx, identity) in data.identities.iter().enumerate() {
        per_identity.entry(identity).or_default().push(idx);
    }

    let mut res = vec![];
    for (i, (identity, events)) in per_identity.into_iter().enumerate() {
        if i % CHECK_INTERVAL == 0 {
            ctx.check()?;
        }

        let mut matcher = StepMatcher::new(plan.steps.len());
        for idx in events {
            let Some(step) = matcher.expects() else {
                break;
            };
            if plan.step_matches(step, &data.events[idx], &data.row(idx)) {
                matcher.advance(idx);
            }
        }

        if matcher.reached() > 0 {
            res.push(Conversion {
                identity,
                matched: matcher.matched,
            });
        }
    }

    Ok(res)
}

fn breakdown_values(plan: &Plan, data: &Dataset, conv: &Conversion) -> Vec<PropValue> {
    plan.breakdowns
        .iter()
        .map(|b| match b.source {
            BreakdownSource::Step(step) => match conv.matched.get(step) {
                Some(idx) => b.value(&data.row(*idx), conv.identity, step),
                None => PropValue::Absent,
            },
            _ => b.value(&data.row(conv.matched[0]), conv.identity, 0),
        })
        .collect()
}

/// Step counts of a funnel group with the summed seconds between adjacent steps.
struct GroupStats {
    counts: Vec<u64>,
    gaps: Vec<i64>,
}

impl GroupStats {
    fn new(steps: usize) -> Self {
        Self {
            counts: vec![0; steps],
            gaps: vec![0; steps.saturating_sub(1)],
        }
    }

    fn add(&mut self, data: &Dataset, conv: &Conversion) {
        for count in self.counts.iter_mut().take(conv.matched.len()) {
            *count += 1;
        }
        for (gap, pair) in self.gaps.iter_mut().zip(conv.matched.windows(2)) {
            *gap += data.events[pair[1]].timestamp - data.events[pair[0]].timestamp;
        }
    }
}

/// Computes a unique users funnel over loaded data.
///
/// The result meta carries a `MetaStepTimeInfo` table with the average seconds between
/// adjacent steps, one row per result row.
pub fn funnel(
    ctx: &Context,
    cfg: &config::Query,
    query: &Query,
    plan: &Plan,
    data: &Dataset,
) -> Result<QueryResult> {
    let n = plan.steps.len();
    let conversions = scan(ctx, plan, data)?;
    debug!(identities = conversions.len(), "funnel scanned");

    let layout = FunnelLayout {
        breakdowns: query.group_by.iter().map(|g| g.property.clone()).collect(),
        steps: n,
    };

    let mut totals = GroupStats::new(n);
    for conv in conversions.iter() {
        totals.add(data, conv);
    }

    let mut ordered = vec![];
    if !plan.breakdowns.is_empty() {
        let values = conversions
            .iter()
            .map(|conv| breakdown_values(plan, data, conv))
            .collect::<Vec<_>>();
        let buckets =
            plan.numeric_buckets(values.iter().map(|v| v.as_slice()), cfg.numeric_buckets);

        let mut groups: IndexMap<Vec<String>, GroupStats> = IndexMap::new();
        for (conv, values) in conversions.iter().zip(values.iter()) {
            groups
                .entry(plan.labels(values, &buckets))
                .or_insert_with(|| GroupStats::new(n))
                .add(data, conv);
        }

        ordered = groups.into_iter().collect::<Vec<_>>();
        // stable, ties keep first seen order
        ordered.sort_by(|a, b| b.1.counts[0].cmp(&a.1.counts[0]));
        ordered.truncate(cfg.results_limit.saturating_sub(1));
    }

    let no_group = vec![NO_GROUP.to_string(); plan.breakdowns.len()];
    let mut rows = Vec::with_capacity(ordered.len() + 1);
    let mut step_times = Vec::with_capacity(ordered.len() + 1);
    for (labels, stats) in std::iter::once((&no_group, &totals))
        .chain(ordered.iter().map(|(labels, stats)| (labels, stats)))
    {
        rows.push(layout.row(labels, &stats.counts));
        step_times.push(layout.step_time_row(labels, &stats.counts, &stats.gaps));
    }

    Ok(QueryResult {
        headers: layout.headers(),
        rows,
        meta: Some(ResultMeta {
            metrics: vec![HeaderRows {
                title: META_STEP_TIME_INFO.to_string(),
                headers: layout.step_time_headers(),
                rows: step_times,
            }],
        }),
    })
}
