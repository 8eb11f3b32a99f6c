use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use common::EventNameId;
use common::ProjectId;
use common::UserId;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::Result;
use crate::error::StoreError;
use crate::records::Event;
use crate::records::User;
use crate::store::Store;

#[derive(Default)]
struct Tables {
    // insertion order is the tie breaker for equal timestamps
    events: Vec<Event>,
    users: Vec<User>,
}

/// In-memory [Store] backed by append-only tables.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    latency: Option<Duration>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every read, used to exercise deadlines.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every read fail with [StoreError::Unavailable] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub fn add_user(&self, user: User) {
        let mut tables = self.tables.write();
        // identify moves a user to a customer id, the row is replaced in place
        match tables.users.iter_mut().find(|u| u.id == user.id) {
            Some(existing) => *existing = user,
            None => tables.users.push(user),
        }
    }

    pub fn add_event(&self, event: Event) {
        self.tables.write().events.push(event);
    }

    pub fn add_events(&self, events: impl IntoIterator<Item = Event>) {
        self.tables.write().events.extend(events);
    }

    pub fn events_count(&self) -> usize {
        self.tables.read().events.len()
    }

    async fn before_read(&self) -> Result<()> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn events(
        &self,
        project_id: ProjectId,
        from: i64,
        to: i64,
        event_names: &[EventNameId],
    ) -> Result<Vec<Event>> {
        self.before_read().await?;

        let names: HashSet<EventNameId> = event_names.iter().cloned().collect();
        let mut events = {
            let tables = self.tables.read();
            tables
                .events
                .iter()
                .filter(|e| {
                    e.project_id == project_id
                        && e.timestamp >= from
                        && e.timestamp < to
                        && names.contains(&e.event_name_id)
                })
                .cloned()
                .collect::<Vec<_>>()
        };
        // stable, keeps insertion order for equal timestamps
        events.sort_by_key(|e| e.timestamp);
        debug!(project_id, events = events.len(), "events scanned");

        Ok(events)
    }

    async fn users(&self, project_id: ProjectId, ids: &[UserId]) -> Result<Vec<User>> {
        self.before_read().await?;

        let ids: HashSet<UserId> = ids.iter().cloned().collect();
        let tables = self.tables.read();
        Ok(tables
            .users
            .iter()
            .filter(|u| u.project_id == project_id && ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn users_by_customer_ids(
        &self,
        project_id: ProjectId,
        customer_user_ids: &[String],
    ) -> Result<Vec<User>> {
        self.before_read().await?;

        let ids: HashSet<&str> = customer_user_ids.iter().map(|v| v.as_str()).collect();
        let tables = self.tables.read();
        Ok(tables
            .users
            .iter()
            .filter(|u| {
                u.project_id == project_id
                    && u.customer_user_id().map(|c| ids.contains(c)).unwrap_or(false)
            })
            .cloned()
            .collect())
    }
}
