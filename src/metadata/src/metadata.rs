use std::sync::Arc;

use crate::event_names::EventNames;
use crate::lists;

pub struct MetadataProvider {
    pub event_names: Arc<EventNames>,
    pub lists: Arc<dyn lists::Provider>,
}

impl MetadataProvider {
    pub fn new(event_names: Arc<EventNames>, lists: Arc<dyn lists::Provider>) -> Self {
        MetadataProvider { event_names, lists }
    }

    pub fn new_memory() -> Self {
        MetadataProvider {
            event_names: Arc::new(EventNames::new()),
            lists: Arc::new(lists::ProviderImpl::new()),
        }
    }
}
