use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use common::config;
use common::query::EventsCondition;
use common::query::LogicalOp;
use common::query::Operator;
use common::query::PropertyEntity;
use common::query::PropertyType;
use common::query::Query;
use common::query::QueryClass;
use common::query::QueryEventWithProperties;
use common::query::QueryGroupByProperty;
use common::query::QueryProperty;
use common::query::QueryType;
use common::query::DEFAULT_TIMEZONE;
use common::ProjectId;
use common::Properties;
use common::UserId;
use metadata::event_names::EventNames;
use metadata::lists;
use metadata::MetadataProvider;
use storage::Event;
use storage::MemoryStore;
use storage::User;

use crate::QueryProvider;
use crate::ResultCache;
use crate::Result;

/// In-memory store and metadata of one project.
pub struct Fixture {
    pub project_id: ProjectId,
    pub store: Arc<MemoryStore>,
    pub metadata: Arc<MetadataProvider>,
    lists: Arc<lists::ProviderImpl>,
    event_id: AtomicU64,
}

impl Fixture {
    pub fn new(project_id: ProjectId) -> Self {
        Self::with_store(project_id, MemoryStore::new())
    }

    pub fn with_store(project_id: ProjectId, store: MemoryStore) -> Self {
        let lists = Arc::new(lists::ProviderImpl::new());
        let metadata = Arc::new(MetadataProvider::new(
            Arc::new(EventNames::new()),
            lists.clone(),
        ));
        Self {
            project_id,
            store: Arc::new(store),
            metadata,
            lists,
            event_id: AtomicU64::new(1),
        }
    }

    pub fn user(&self, id: UserId, customer_user_id: Option<&str>, properties: Properties) {
        self.store.add_user(User {
            id,
            project_id: self.project_id,
            customer_user_id: customer_user_id.map(|v| v.to_string()),
            properties,
            join_timestamp: 0,
            properties_updated_at: 0,
        });
    }

    /// Tracks an event without a user properties snapshot.
    pub fn event(
        &self,
        user_id: UserId,
        name: &str,
        timestamp: i64,
        properties: Properties,
    ) -> Result<()> {
        let event_name = self
            .metadata
            .event_names
            .get_or_create(self.project_id, name)?;
        self.store.add_event(Event {
            id: self.event_id.fetch_add(1, Ordering::SeqCst),
            project_id: self.project_id,
            user_id,
            event_name_id: event_name.id,
            timestamp,
            properties,
            user_properties: None,
            session_id: None,
        });

        Ok(())
    }

    pub fn upload_list(&self, reference: &str, values: &[&str]) {
        self.lists
            .upload(self.project_id, reference, values.iter().copied());
    }

    pub fn provider(&self, cfg: config::Query) -> QueryProvider {
        QueryProvider::new(
            self.metadata.clone(),
            self.store.clone(),
            cfg,
            Arc::new(ResultCache::new(16)),
        )
    }
}

pub fn query(class: QueryClass, typ: QueryType, condition: EventsCondition, events: &[&str]) -> Query {
    Query {
        class,
        typ,
        condition,
        events: events
            .iter()
            .map(|name| QueryEventWithProperties::new(name))
            .collect(),
        global_properties: vec![],
        group_by: vec![],
        group_by_timestamp: None,
        timezone: DEFAULT_TIMEZONE.to_string(),
        from: 0,
        to: 1_000_000,
    }
}

pub fn prop(entity: PropertyEntity, property: &str, op: Operator, value: &str) -> QueryProperty {
    QueryProperty {
        entity,
        property: property.to_string(),
        operator: op,
        typ: if op.is_numeric() {
            PropertyType::Numerical
        } else {
            PropertyType::Categorical
        },
        value: value.to_string(),
        logical_op: LogicalOp::And,
    }
}

/// Breakdown by an event property of the named step.
pub fn group_by_event(property: &str, event_name: &str) -> QueryGroupByProperty {
    QueryGroupByProperty {
        entity: PropertyEntity::Event,
        property: property.to_string(),
        typ: PropertyType::Categorical,
        event_name: event_name.to_string(),
        event_index: None,
        granularity: None,
        group_by_type: None,
    }
}

/// Breakdown by the latest user property of the identity.
pub fn group_by_user(property: &str) -> QueryGroupByProperty {
    QueryGroupByProperty {
        entity: PropertyEntity::UserGlobal,
        property: property.to_string(),
        typ: PropertyType::Categorical,
        event_name: String::new(),
        event_index: None,
        granularity: None,
        group_by_type: None,
    }
}
