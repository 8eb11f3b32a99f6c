use std::sync::Arc;

use axum::Router;
use common::config::Config;
use metadata::event_names::EventNames;
use metadata::lists;
use metadata::MetadataProvider;
use platform::PlatformProvider;
use query::QueryProvider;
use query::ResultCache;
use storage::MemoryStore;
use tokio::select;
use tokio::signal::unix::SignalKind;
use tracing::debug;
use tracing::info;

use crate::error::Result;
use crate::fixtures;

async fn shutdown_signal() {
    let sig_int = tokio::signal::unix::signal(SignalKind::interrupt());
    let sig_term = tokio::signal::unix::signal(SignalKind::terminate());
    match (sig_int, sig_term) {
        (Ok(mut sig_int), Ok(mut sig_term)) => select! {
            _ = sig_int.recv() => info!("SIGINT received"),
            _ = sig_term.recv() => info!("SIGTERM received"),
        },
        _ => {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("ctrl-c received");
            }
        }
    }
}

pub async fn start(cfg: Config) -> Result<()> {
    debug!("query config: {:?}", cfg.query);

    let store = Arc::new(MemoryStore::new());
    let event_names = Arc::new(EventNames::new());
    let lists = Arc::new(lists::ProviderImpl::new());
    if let Some(path) = &cfg.data.fixtures {
        info!("loading fixtures from {:?}...", path);
        let events = fixtures::load(fixtures::read(path)?, &store, &event_names, &lists)?;
        info!("{events} events loaded");
    }

    let md = Arc::new(MetadataProvider::new(event_names, lists));
    let query = Arc::new(QueryProvider::new(
        md,
        store,
        cfg.query.clone(),
        Arc::new(ResultCache::new(cfg.cache.capacity)),
    ));
    let platform = Arc::new(PlatformProvider::new(query));

    info!("initializing platform...");
    let router = platform::http::attach_routes(Router::new(), &platform);

    info!("listening on {}", cfg.server.host);
    let listener = tokio::net::TcpListener::bind(cfg.server.host).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
