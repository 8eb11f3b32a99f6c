use std::sync::Arc;

use axum::extract::Extension;
use axum::extract::Path;
use axum::routing;
use axum::Router;
use common::query::Query;
use common::query::QueryGroup;
use query::QueryResult;
use query::ResultGroup;

use crate::http::Json;
use crate::queries;
use crate::queries::DashboardUnitRequest;
use crate::queries::DashboardUnitResponse;
use crate::Result;

async fn query_group(
    Extension(provider): Extension<Arc<dyn queries::Provider>>,
    Path(project_id): Path<u64>,
    Json(request): Json<QueryGroup>,
) -> Result<Json<ResultGroup>> {
    Ok(Json(provider.query_group(project_id, request).await?))
}

async fn query(
    Extension(provider): Extension<Arc<dyn queries::Provider>>,
    Path(project_id): Path<u64>,
    Json(request): Json<Query>,
) -> Result<Json<QueryResult>> {
    Ok(Json(provider.query(project_id, request).await?))
}

async fn dashboard_unit(
    Extension(provider): Extension<Arc<dyn queries::Provider>>,
    Path((project_id, dashboard_id, unit_id)): Path<(u64, u64, u64)>,
    Json(request): Json<DashboardUnitRequest>,
) -> Result<Json<DashboardUnitResponse>> {
    Ok(Json(
        provider
            .dashboard_unit(project_id, dashboard_id, unit_id, request)
            .await?,
    ))
}

pub fn attach_routes(router: Router) -> Router {
    router.nest(
        "/api/v1/projects/:project_id",
        Router::new()
            .route("/queries", routing::post(query_group))
            .route("/queries/single", routing::post(query))
            .route(
                "/dashboards/:dashboard_id/units/:unit_id/query",
                routing::post(dashboard_unit),
            ),
    )
}
