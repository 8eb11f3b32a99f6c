#[cfg(test)]
mod tests {
    use common::Properties;
    use storage::error::StoreError;
    use storage::Event;
    use storage::MemoryStore;
    use storage::Store;
    use storage::User;

    fn event(id: u64, user_id: u64, name: u64, ts: i64) -> Event {
        Event {
            id,
            project_id: 1,
            user_id,
            event_name_id: name,
            timestamp: ts,
            properties: Properties::new(),
            user_properties: None,
            session_id: None,
        }
    }

    fn user(id: u64, customer_user_id: Option<&str>) -> User {
        User {
            id,
            project_id: 1,
            customer_user_id: customer_user_id.map(|v| v.to_string()),
            properties: Properties::new(),
            join_timestamp: 0,
            properties_updated_at: 0,
        }
    }

    #[tokio::test]
    async fn test_events_window_and_order() {
        let store = MemoryStore::new();
        store.add_events(vec![
            event(1, 1, 1, 30),
            event(2, 1, 1, 10),
            event(3, 1, 2, 10),
            event(4, 1, 1, 10),
            event(5, 1, 1, 100),
            event(6, 1, 3, 20),
        ]);
        let mut other = event(7, 1, 1, 20);
        other.project_id = 2;
        store.add_event(other);

        let ids = store
            .events(1, 10, 100, &[1, 2])
            .await
            .unwrap()
            .iter()
            .map(|e| e.id)
            .collect::<Vec<_>>();
        // ties keep insertion order, `to` is exclusive
        assert_eq!(ids, vec![2, 3, 4, 1]);
    }

    #[tokio::test]
    async fn test_users() {
        let store = MemoryStore::new();
        store.add_user(user(1, None));
        store.add_user(user(2, Some("c1")));
        store.add_user(user(3, Some("")));
        store.add_user(user(1, Some("c1")));

        let users = store.users(1, &[1, 3]).await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].customer_user_id(), Some("c1"));
        assert_eq!(users[1].customer_user_id(), None);

        let mut ids = store
            .users_by_customer_ids(1, &["c1".to_string()])
            .await
            .unwrap()
            .iter()
            .map(|u| u.id)
            .collect::<Vec<_>>();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_unavailable() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.events(1, 0, 10, &[1]).await,
            Err(StoreError::Unavailable(_))
        ));

        store.set_unavailable(false);
        assert!(store.events(1, 0, 10, &[1]).await.unwrap().is_empty());
    }
}
