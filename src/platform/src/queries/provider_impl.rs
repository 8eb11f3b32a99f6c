use std::sync::Arc;

use axum::async_trait;
use common::query::Query;
use common::query::QueryGroup;
use common::ProjectId;
use query::QueryProvider;
use query::QueryResult;
use query::ResultGroup;
use tracing::debug;

use crate::queries::DashboardUnitRequest;
use crate::queries::DashboardUnitResponse;
use crate::queries::Provider;
use crate::Result;

pub struct ProviderImpl {
    query: Arc<QueryProvider>,
}

impl ProviderImpl {
    pub fn new(query: Arc<QueryProvider>) -> Self {
        Self { query }
    }
}

#[async_trait]
impl Provider for ProviderImpl {
    async fn query_group(&self, project_id: ProjectId, req: QueryGroup) -> Result<ResultGroup> {
        Ok(self
            .query
            .execute_group(query::Context::new(project_id), req, None)
            .await?)
    }

    async fn query(&self, project_id: ProjectId, req: Query) -> Result<QueryResult> {
        Ok(self
            .query
            .execute(query::Context::new(project_id), req)
            .await?)
    }

    async fn dashboard_unit(
        &self,
        project_id: ProjectId,
        dashboard_id: u64,
        unit_id: u64,
        req: DashboardUnitRequest,
    ) -> Result<DashboardUnitResponse> {
        let (cached, res) = self
            .query
            .execute_cached(
                query::Context::new(project_id),
                dashboard_id,
                unit_id,
                req.query,
                req.preset,
            )
            .await?;
        debug!(dashboard_id, unit_id, cached, "dashboard unit served");

        Ok(DashboardUnitResponse {
            cached,
            result: res.result,
            meta: res.meta,
        })
    }
}
