use std::sync::Arc;

use query::QueryProvider;

use crate::queries;

pub struct PlatformProvider {
    pub queries: Arc<dyn queries::Provider>,
}

impl PlatformProvider {
    pub fn new(query: Arc<QueryProvider>) -> Self {
        Self {
            queries: Arc::new(queries::ProviderImpl::new(query)),
        }
    }
}
