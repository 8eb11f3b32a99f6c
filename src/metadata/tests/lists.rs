#[cfg(test)]
mod tests {
    use metadata::error::MetadataError;
    use metadata::lists::Provider;
    use metadata::lists::ProviderImpl;

    #[tokio::test]
    async fn test_resolve() {
        let lists = ProviderImpl::new();
        lists.upload(1, "emails.csv", ["a@x.com", "b@x.com"]);

        let values = lists.resolve(1, "emails.csv").await.unwrap();
        assert!(values.contains("a@x.com"));
        assert_eq!(values.len(), 2);

        assert!(matches!(
            lists.resolve(2, "emails.csv").await,
            Err(MetadataError::NotFound(_))
        ));

        lists.upload(1, "emails.csv", ["c@x.com"]);
        let values = lists.resolve(1, "emails.csv").await.unwrap();
        assert_eq!(values.len(), 1);
    }
}
