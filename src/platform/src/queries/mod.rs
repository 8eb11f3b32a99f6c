pub mod provider_impl;

use axum::async_trait;
use common::query::Query;
use common::query::QueryGroup;
use common::ProjectId;
pub use provider_impl::ProviderImpl;
use query::cache::CacheMeta;
use query::QueryResult;
use query::ResultGroup;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[async_trait]
pub trait Provider: Sync + Send {
    async fn query_group(&self, project_id: ProjectId, req: QueryGroup) -> Result<ResultGroup>;
    async fn query(&self, project_id: ProjectId, req: Query) -> Result<QueryResult>;
    async fn dashboard_unit(
        &self,
        project_id: ProjectId,
        dashboard_id: u64,
        unit_id: u64,
        req: DashboardUnitRequest,
    ) -> Result<DashboardUnitResponse>;
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DashboardUnitRequest {
    pub query: Query,
    #[serde(default)]
    pub preset: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DashboardUnitResponse {
    pub cached: bool,
    pub result: QueryResult,
    pub meta: CacheMeta,
}
