pub mod json;
pub mod queries;

use std::sync::Arc;

use axum::Extension;
use axum::Router;
pub use json::Json;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::PlatformProvider;

pub fn attach_routes(mut router: Router, platform: &Arc<PlatformProvider>) -> Router {
    router = queries::attach_routes(router);

    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    router
        .layer(Extension(platform.queries.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
