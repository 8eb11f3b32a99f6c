use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::ProjectId;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::MetadataError;
use crate::Result;

/// Resolves an uploaded list reference into its values.
#[async_trait]
pub trait Provider: Sync + Send {
    async fn resolve(&self, project_id: ProjectId, reference: &str) -> Result<Arc<HashSet<String>>>;
}

/// Lists held in memory, keyed by project and file reference.
#[derive(Default)]
pub struct ProviderImpl {
    lists: RwLock<HashMap<(ProjectId, String), Arc<HashSet<String>>>>,
}

impl ProviderImpl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload<I, S>(&self, project_id: ProjectId, reference: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect::<HashSet<_>>();
        debug!(project_id, reference, values = values.len(), "list uploaded");
        self.lists
            .write()
            .insert((project_id, reference.to_string()), Arc::new(values));
    }
}

#[async_trait]
impl Provider for ProviderImpl {
    async fn resolve(&self, project_id: ProjectId, reference: &str) -> Result<Arc<HashSet<String>>> {
        self.lists
            .read()
            .get(&(project_id, reference.to_string()))
            .cloned()
            .ok_or_else(|| MetadataError::NotFound(format!("list {reference:?} not found")))
    }
}
