use async_trait::async_trait;
use common::EventNameId;
use common::ProjectId;
use common::UserId;

use crate::error::Result;
use crate::records::Event;
use crate::records::User;

/// Read-only access to ingested events and users.
#[async_trait]
pub trait Store: Send + Sync {
    /// Events of `event_names` with `from <= timestamp < to`, ordered by timestamp and then by
    /// insertion order.
    async fn events(
        &self,
        project_id: ProjectId,
        from: i64,
        to: i64,
        event_names: &[EventNameId],
    ) -> Result<Vec<Event>>;

    async fn users(&self, project_id: ProjectId, ids: &[UserId]) -> Result<Vec<User>>;

    /// All users carrying one of `customer_user_ids`.
    async fn users_by_customer_ids(
        &self,
        project_id: ProjectId,
        customer_user_ids: &[String],
    ) -> Result<Vec<User>>;
}
