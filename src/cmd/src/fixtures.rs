use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use common::ProjectId;
use common::Properties;
use common::UserId;
use metadata::event_names::EventNames;
use metadata::lists;
use serde::Deserialize;
use storage::Event;
use storage::MemoryStore;
use storage::User;
use tracing::debug;

use crate::error::Error;
use crate::error::Result;

#[derive(Debug, Deserialize)]
pub struct FixtureUser {
    pub id: UserId,
    #[serde(default)]
    pub customer_user_id: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub join_timestamp: i64,
    #[serde(default)]
    pub properties_updated_at: i64,
}

#[derive(Debug, Deserialize)]
pub struct FixtureEvent {
    pub user_id: UserId,
    /// Event name, registered in the dictionary on load.
    pub event: String,
    pub timestamp: i64,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub user_properties: Option<Properties>,
    #[serde(default)]
    pub session_id: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct ProjectFixture {
    pub id: ProjectId,
    #[serde(default)]
    pub users: Vec<FixtureUser>,
    #[serde(default)]
    pub events: Vec<FixtureEvent>,
    /// Uploaded lists by reference.
    #[serde(default)]
    pub lists: BTreeMap<String, Vec<String>>,
}

/// Seed data of the in-memory store.
#[derive(Debug, Deserialize)]
pub struct Fixtures {
    pub projects: Vec<ProjectFixture>,
}

pub fn read(path: &Path) -> Result<Fixtures> {
    if !path.exists() {
        return Err(Error::FileNotFound(format!(
            "fixtures path {path:?} doesn't exist"
        )));
    }

    Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
}

/// Loads fixtures into the store and metadata, returns the number of events loaded.
pub fn load(
    fixtures: Fixtures,
    store: &MemoryStore,
    event_names: &EventNames,
    lists: &lists::ProviderImpl,
) -> Result<usize> {
    let mut event_id = store.events_count() as u64;
    for project in fixtures.projects {
        for user in project.users {
            store.add_user(User {
                id: user.id,
                project_id: project.id,
                customer_user_id: user.customer_user_id,
                properties: user.properties,
                join_timestamp: user.join_timestamp,
                properties_updated_at: user.properties_updated_at,
            });
        }

        let mut events = Vec::with_capacity(project.events.len());
        for event in project.events {
            let event_name = event_names.get_or_create(project.id, &event.event)?;
            event_id += 1;
            events.push(Event {
                id: event_id,
                project_id: project.id,
                user_id: event.user_id,
                event_name_id: event_name.id,
                timestamp: event.timestamp,
                properties: event.properties,
                user_properties: event.user_properties,
                session_id: event.session_id,
            });
        }
        debug!(project_id = project.id, events = events.len(), "fixture loaded");
        store.add_events(events);

        for (reference, values) in project.lists {
            lists.upload(project.id, &reference, values);
        }
    }

    Ok(event_id as usize)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use common::PropValue;
    use metadata::lists::Provider;
    use storage::Store;

    use super::*;

    const FIXTURES: &str = r#"{
        "projects": [{
            "id": 1,
            "users": [
                {"id": 1, "customer_user_id": "ext-1", "properties": {"$Country": "US"}},
                {"id": 2}
            ],
            "events": [
                {"user_id": 1, "event": "view", "timestamp": 10, "properties": {"amount": 5}},
                {"user_id": 2, "event": "buy", "timestamp": 20}
            ],
            "lists": {"countries.csv": ["US", "India"]}
        }]
    }"#;

    #[tokio::test]
    async fn test_load() {
        let fixtures: Fixtures = serde_json::from_str(FIXTURES).unwrap();
        let store = MemoryStore::new();
        let event_names = EventNames::new();
        let lists = Arc::new(lists::ProviderImpl::new());

        let n = load(fixtures, &store, &event_names, &lists).unwrap();
        assert_eq!(n, 2);

        let view = event_names.get_by_name(1, "view").unwrap();
        let events = store.events(1, 0, 100, &[view.id]).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].properties.get("amount"), &PropValue::Number(5.0));

        let users = store.users(1, &[1]).await.unwrap();
        assert_eq!(users[0].properties.get("$country"), &PropValue::from("US"));

        let list = lists.resolve(1, "countries.csv").await.unwrap();
        assert!(list.contains("India"));
    }
}
