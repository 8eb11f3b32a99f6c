use std::fmt;
use std::fmt::Display;

use ahash::AHashMap;
use ahash::AHashSet;
use common::ProjectId;
use common::Properties;
use common::UserId;
use storage::Store;
use storage::User;

use crate::Result;

/// Deduplication key of "unique users".
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdentityKey {
    /// Identified users, all user rows sharing the customer id.
    Customer(String),
    /// Anonymous user, its own identity.
    User(UserId),
}

impl Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityKey::Customer(id) => write!(f, "{id}"),
            IdentityKey::User(id) => write!(f, "{id}"),
        }
    }
}

pub fn canonical_identity(user: &User) -> IdentityKey {
    match user.customer_user_id() {
        Some(id) => IdentityKey::Customer(id.to_string()),
        None => IdentityKey::User(user.id),
    }
}

/// Read-time view of the users behind a set of events, grouped into identities.
#[derive(Default)]
pub struct Identities {
    users: AHashMap<UserId, User>,
    keys: AHashMap<UserId, IdentityKey>,
    // member with the freshest properties
    latest: AHashMap<IdentityKey, UserId>,
    empty: Properties,
}

impl Identities {
    pub fn new(users: impl IntoIterator<Item = User>) -> Self {
        let mut identities = Identities::default();
        for user in users {
            identities.insert(user);
        }

        identities
    }

    /// Loads the users of `user_ids` together with every other user sharing their identity.
    pub async fn load(
        store: &dyn Store,
        project_id: ProjectId,
        user_ids: &[UserId],
    ) -> Result<Self> {
        let users = store.users(project_id, user_ids).await?;
        let customer_ids = users
            .iter()
            .filter_map(|u| u.customer_user_id().map(|v| v.to_string()))
            .collect::<AHashSet<_>>()
            .into_iter()
            .collect::<Vec<_>>();

        let mut identities = Identities::new(users);
        if !customer_ids.is_empty() {
            for user in store
                .users_by_customer_ids(project_id, &customer_ids)
                .await?
            {
                identities.insert(user);
            }
        }

        Ok(identities)
    }

    fn insert(&mut self, user: User) {
        let key = canonical_identity(&user);
        let fresher = match self.latest.get(&key).and_then(|id| self.users.get(id)) {
            None => true,
            Some(cur) => {
                (user.properties_updated_at, user.join_timestamp, user.id)
                    > (cur.properties_updated_at, cur.join_timestamp, cur.id)
            }
        };
        if fresher {
            self.latest.insert(key.clone(), user.id);
        }
        self.keys.insert(user.id, key);
        self.users.insert(user.id, user);
    }

    /// Identity of a user id, users without a record are anonymous identities.
    pub fn canonical_identity(&self, user_id: UserId) -> IdentityKey {
        self.keys
            .get(&user_id)
            .cloned()
            .unwrap_or(IdentityKey::User(user_id))
    }

    /// Current properties of the user row itself.
    pub fn user_properties(&self, user_id: UserId) -> &Properties {
        self.users
            .get(&user_id)
            .map(|u| &u.properties)
            .unwrap_or(&self.empty)
    }

    /// Latest properties across all users of the identity.
    pub fn latest_properties(&self, key: &IdentityKey) -> &Properties {
        self.latest
            .get(key)
            .and_then(|id| self.users.get(id))
            .map(|u| &u.properties)
            .unwrap_or(&self.empty)
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}
