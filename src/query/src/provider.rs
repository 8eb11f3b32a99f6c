use std::sync::Arc;
use std::time::Instant as StdInstant;

use chrono::Utc;
use common::config;
use common::query::Query;
use common::query::QueryClass;
use common::query::QueryGroup;
use futures::StreamExt;
use futures::TryStreamExt;
use metadata::MetadataProvider;
use storage::Store;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::debug;

use crate::cache::CacheMeta;
use crate::cache::CachedResult;
use crate::cache::ResultCache;
use crate::error::QueryError;
use crate::events;
use crate::funnel;
use crate::plan::Dataset;
use crate::plan::Plan;
use crate::result::QueryResult;
use crate::result::ResultGroup;
use crate::Context;
use crate::Result;

pub struct QueryProvider {
    metadata: Arc<MetadataProvider>,
    store: Arc<dyn Store>,
    config: config::Query,
    cache: Arc<ResultCache>,
    // bounds concurrent store scans across all requests
    scans: Arc<Semaphore>,
}

impl QueryProvider {
    pub fn new(
        metadata: Arc<MetadataProvider>,
        store: Arc<dyn Store>,
        config: config::Query,
        cache: Arc<ResultCache>,
    ) -> Self {
        let scans = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            metadata,
            store,
            config,
            cache,
            scans,
        }
    }

    pub fn config(&self) -> &config::Query {
        &self.config
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    /// Executes one query.
    ///
    /// The query runs until it completes, `ctx` is cancelled or its deadline (the configured
    /// timeout when unset) passes. Cancellation drops every in-flight store read and returns
    /// [QueryError::Cancelled], never a partial result.
    pub async fn execute(&self, ctx: Context, query: Query) -> Result<QueryResult> {
        let deadline = ctx
            .deadline
            .unwrap_or_else(|| Instant::now() + self.config.timeout);
        let ctx = ctx.with_deadline(deadline);
        let start = StdInstant::now();

        let res = tokio::select! {
            biased;
            _ = ctx.cancel.cancelled() => Err(QueryError::Cancelled),
            res = tokio::time::timeout_at(deadline, self.run(&ctx, &query)) => match res {
                Ok(res) => res,
                Err(_) => Err(QueryError::Cancelled),
            },
        };

        match &res {
            Ok(result) => debug!(
                project_id = ctx.project_id,
                class = %query.class,
                rows = result.rows.len(),
                elapsed = ?start.elapsed(),
                "query executed"
            ),
            Err(err) => debug!(
                project_id = ctx.project_id,
                class = %query.class,
                kind = %err.kind(),
                elapsed = ?start.elapsed(),
                "query failed"
            ),
        }

        res
    }

    async fn run(&self, ctx: &Context, query: &Query) -> Result<QueryResult> {
        let plan = Plan::try_new(ctx, &self.metadata, query).await?;

        let data = {
            let _permit = self
                .scans
                .acquire()
                .await
                .map_err(|err| QueryError::Internal(err.to_string()))?;
            Dataset::load(ctx, self.store.as_ref(), &plan, query.from, query.to).await?
        };
        debug!(events = data.events.len(), users = data.users.len(), "data loaded");

        match query.class {
            QueryClass::Events => events::aggregate(ctx, &self.config, query, &plan, &data),
            QueryClass::Funnel => funnel::funnel(ctx, &self.config, query, &plan, &data),
        }
    }

    /// Executes every query of the group, at most `concurrency` (default from the config)
    /// at a time.
    ///
    /// Results keep the input order. The first failing query fails the group and cancels
    /// the queries still running.
    pub async fn execute_group(
        &self,
        ctx: Context,
        group: QueryGroup,
        concurrency: Option<usize>,
    ) -> Result<ResultGroup> {
        if group.queries.is_empty() {
            return Err(QueryError::InvalidQuery("empty query group".to_string()));
        }

        let limit = concurrency.unwrap_or(self.config.max_concurrency).max(1);
        let group_ctx = ctx.child();
        let mut results = futures::stream::iter(group.queries.into_iter().enumerate().map(
            |(idx, query)| {
                let ctx = group_ctx.child();
                let cancel = group_ctx.cancel.clone();
                async move {
                    match self.execute(ctx, query).await {
                        Ok(res) => Ok((idx, res)),
                        Err(err) => {
                            cancel.cancel();
                            Err(err.with_context(format!("query {idx}")))
                        }
                    }
                }
            },
        ))
        .buffer_unordered(limit)
        .try_collect::<Vec<_>>()
        .await?;

        results.sort_by_key(|(idx, _)| *idx);
        Ok(ResultGroup {
            results: results.into_iter().map(|(_, res)| res).collect(),
        })
    }

    /// Serves a dashboard unit from the cache, computing and storing it on a miss.
    ///
    /// Returns whether the result was a cache hit.
    pub async fn execute_cached(
        &self,
        ctx: Context,
        dashboard_id: u64,
        unit_id: u64,
        query: Query,
        preset: Option<String>,
    ) -> Result<(bool, CachedResult)> {
        let (from, to) = (query.from, query.to);
        let timezone = query.timezone.clone();
        if let Some(hit) = self.cache.get(dashboard_id, unit_id, from, to, &timezone) {
            debug!(dashboard_id, unit_id, "cache hit");
            return Ok((true, hit));
        }

        let refreshed_at = ctx.cur_time.timestamp();
        let result = self.execute(ctx, query).await?;
        let meta = CacheMeta {
            refreshed_at,
            last_computed_at: Utc::now().timestamp(),
            preset,
        };
        self.cache.set(
            result.clone(),
            dashboard_id,
            unit_id,
            from,
            to,
            &timezone,
            meta.clone(),
        );

        Ok((false, CachedResult { result, meta }))
    }
}
