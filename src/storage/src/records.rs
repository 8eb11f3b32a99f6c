use common::EventNameId;
use common::ProjectId;
use common::Properties;
use common::UserId;
use serde::Deserialize;
use serde::Serialize;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Event {
    pub id: u64,
    pub project_id: ProjectId,
    pub user_id: UserId,
    pub event_name_id: EventNameId,
    /// Unix seconds.
    pub timestamp: i64,
    #[serde(default)]
    pub properties: Properties,
    /// User properties as they were when the event was tracked.
    #[serde(default)]
    pub user_properties: Option<Properties>,
    #[serde(default)]
    pub session_id: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: UserId,
    pub project_id: ProjectId,
    /// External identity key set by identify calls.
    #[serde(default)]
    pub customer_user_id: Option<String>,
    #[serde(default)]
    pub properties: Properties,
    pub join_timestamp: i64,
    #[serde(default)]
    pub properties_updated_at: i64,
}

impl User {
    pub fn customer_user_id(&self) -> Option<&str> {
        self.customer_user_id.as_deref().filter(|v| !v.is_empty())
    }
}
