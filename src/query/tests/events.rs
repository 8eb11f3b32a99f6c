#[cfg(test)]
mod tests {
    use common::config;
    use common::config::AllOccurrencePolicy;
    use common::query::EventsCondition;
    use common::query::GroupByType;
    use common::query::LogicalOp;
    use common::query::Operator;
    use common::query::PropertyEntity;
    use common::query::PropertyType;
    use common::query::Query;
    use common::query::QueryClass;
    use common::query::QueryType;
    use common::query::TimeGranularity;
    use common::Properties;
    use query::error::ErrorKind;
    use query::error::Result;
    use query::test_util::group_by_event;
    use query::test_util::group_by_user;
    use query::test_util::prop;
    use query::test_util::query;
    use query::test_util::Fixture;
    use query::Context;
    use query::Value;
    use rstest::rstest;
    use tracing_test::traced_test;

    // 2021-01-01T00:00:00Z
    const DAY0: i64 = 1609459200;
    const DAY: i64 = 86400;

    fn events(typ: QueryType, condition: EventsCondition, steps: &[&str]) -> Query {
        query(QueryClass::Events, typ, condition, steps)
    }

    fn f(v: f64) -> Value {
        Value::Float(v)
    }

    fn s(v: &str) -> Value {
        Value::from(v)
    }

    fn amounts() -> Result<Fixture> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        for _ in 0..10 {
            fx.event(1, "buy", 10, Properties::new().with("amount", 5i64))?;
        }
        for _ in 0..5 {
            fx.event(1, "buy", 20, Properties::new().with("amount", 12i64))?;
        }

        Ok(fx)
    }

    #[rstest]
    #[case(Operator::GreaterThan, "11", 5.0)]
    #[case(Operator::GreaterThan, "4", 15.0)]
    #[case(Operator::LesserThan, "12", 10.0)]
    #[case(Operator::Equals, "12", 5.0)]
    #[tokio::test]
    async fn test_numeric_filters(
        #[case] op: Operator,
        #[case] value: &str,
        #[case] exp: f64,
    ) -> Result<()> {
        let fx = amounts()?;
        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["buy"]);
        let mut amount = prop(PropertyEntity::Event, "amount", op, value);
        amount.typ = PropertyType::Numerical;
        q.events[0].properties.push(amount);

        let res = fx
            .provider(config::Query::default())
            .execute(Context::new(1), q)
            .await?;
        assert_eq!(res.headers, vec!["aggregate"]);
        assert_eq!(res.rows, vec![vec![f(exp)]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_none_value() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        for country in ["US", "India", "US"] {
            fx.event(1, "view", 10, Properties::new().with("$country", country))?;
        }
        let provider = fx.provider(config::Query::default());

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]);
        q.events[0].properties.push(prop(
            PropertyEntity::Event,
            "$country",
            Operator::NotEqual,
            "$none",
        ));
        let res = provider.execute(Context::new(1), q.clone()).await?;
        assert_eq!(res.rows, vec![vec![f(3.0)]]);

        q.events[0].properties[0].operator = Operator::Equals;
        let res = provider.execute(Context::new(1), q).await?;
        assert!(res.rows.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_breakdown_order() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        fx.event(1, "view", 10, Properties::new().with("$country", "A"))?;
        fx.event(1, "view", 11, Properties::new().with("$country", "B"))?;
        fx.event(1, "view", 12, Properties::new().with("$country", "B"))?;

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]);
        q.group_by.push(group_by_event("$country", "view"));

        let res = fx
            .provider(config::Query::default())
            .execute(Context::new(1), q)
            .await?;
        assert_eq!(res.headers, vec!["$country", "aggregate"]);
        assert_eq!(res.rows, vec![vec![s("B"), f(2.0)], vec![
            s("A"),
            f(1.0)
        ]]);

        Ok(())
    }

    fn conditions() -> Result<Fixture> {
        let fx = Fixture::new(1);
        for user in 1..=3 {
            fx.user(user, None, Properties::new());
        }
        fx.event(1, "a", 10, Properties::new())?;
        fx.event(1, "b", 11, Properties::new())?;
        fx.event(1, "a", 12, Properties::new())?;
        fx.event(2, "a", 13, Properties::new())?;
        fx.event(3, "b", 14, Properties::new())?;

        Ok(fx)
    }

    #[rstest]
    #[case(QueryType::UniqueUsers, 3.0, 1.0)]
    #[case(QueryType::EventsOccurrence, 5.0, 3.0)]
    #[tokio::test]
    async fn test_any_all(
        #[case] typ: QueryType,
        #[case] any: f64,
        #[case] all: f64,
    ) -> Result<()> {
        let fx = conditions()?;
        let provider = fx.provider(config::Query::default());

        let res = provider
            .execute(Context::new(1), events(typ, EventsCondition::Any, &["a", "b"]))
            .await?;
        assert_eq!(res.rows, vec![vec![f(any)]]);

        let res = provider
            .execute(Context::new(1), events(typ, EventsCondition::All, &["a", "b"]))
            .await?;
        assert_eq!(res.rows, vec![vec![f(all)]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_all_first_match_policy() -> Result<()> {
        let fx = conditions()?;
        let cfg = config::Query {
            all_occurrence_policy: AllOccurrencePolicy::FirstMatch,
            ..Default::default()
        };

        let res = fx
            .provider(cfg)
            .execute(
                Context::new(1),
                events(QueryType::EventsOccurrence, EventsCondition::All, &[
                    "a", "b",
                ]),
            )
            .await?;
        assert_eq!(res.rows, vec![vec![f(2.0)]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_each() -> Result<()> {
        let fx = conditions()?;
        let res = fx
            .provider(config::Query::default())
            .execute(
                Context::new(1),
                events(QueryType::UniqueUsers, EventsCondition::Each, &[
                    "a", "b", "c",
                ]),
            )
            .await?;

        assert_eq!(res.headers, vec!["event_index", "event_name", "aggregate"]);
        assert_eq!(res.rows, vec![
            vec![Value::Integer(0), s("a"), f(2.0)],
            vec![Value::Integer(1), s("b"), f(2.0)],
            vec![Value::Integer(2), s("c"), f(0.0)],
        ]);

        Ok(())
    }

    #[traced_test]
    #[tokio::test]
    async fn test_time_series() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new().with("$country", "US"));
        fx.user(2, None, Properties::new().with("$country", "India"));
        fx.event(1, "view", DAY0 + 100, Properties::new())?;
        fx.event(2, "view", DAY0 + 200, Properties::new())?;
        fx.event(1, "view", DAY0 + 2 * DAY + 5, Properties::new())?;

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]);
        q.from = DAY0;
        q.to = DAY0 + 3 * DAY;
        q.group_by_timestamp = Some(TimeGranularity::Date);
        q.group_by.push(group_by_user("$country"));

        let res = fx
            .provider(config::Query::default())
            .execute(Context::new(1), q)
            .await?;
        assert_eq!(res.headers, vec!["$country", "datetime", "aggregate"]);
        assert_eq!(res.rows, vec![
            vec![s("US"), s("2021-01-01T00:00:00+00:00"), f(1.0)],
            vec![s("US"), s("2021-01-02T00:00:00+00:00"), f(0.0)],
            vec![s("US"), s("2021-01-03T00:00:00+00:00"), f(1.0)],
            vec![s("India"), s("2021-01-01T00:00:00+00:00"), f(1.0)],
            vec![s("India"), s("2021-01-02T00:00:00+00:00"), f(0.0)],
            vec![s("India"), s("2021-01-03T00:00:00+00:00"), f(0.0)],
        ]);

        Ok(())
    }

    #[tokio::test]
    async fn test_time_window_is_half_open() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        fx.event(1, "view", 100, Properties::new())?;
        fx.event(1, "view", 200, Properties::new())?;

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]);
        q.from = 100;
        q.to = 200;
        let res = fx
            .provider(config::Query::default())
            .execute(Context::new(1), q)
            .await?;
        assert_eq!(res.rows, vec![vec![f(1.0)]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_numeric_buckets() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        for amount in [0i64, 10, 20] {
            fx.event(1, "buy", 10, Properties::new().with("amount", amount))?;
        }
        fx.event(1, "buy", 10, Properties::new())?;

        let mut gbp = group_by_event("amount", "buy");
        gbp.typ = PropertyType::Numerical;
        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["buy"]);
        q.group_by.push(gbp.clone());

        let cfg = config::Query {
            numeric_buckets: 2,
            ..Default::default()
        };
        let provider = fx.provider(cfg);
        let res = provider.execute(Context::new(1), q.clone()).await?;
        assert_eq!(res.rows, vec![
            vec![s("10 - 20"), f(2.0)],
            vec![s("0 - 10"), f(1.0)],
            vec![s("$none"), f(1.0)],
        ]);

        gbp.group_by_type = Some(GroupByType::RawValues);
        q.group_by = vec![gbp];
        let res = provider.execute(Context::new(1), q).await?;
        assert_eq!(res.rows.len(), 4);

        Ok(())
    }

    #[tokio::test]
    async fn test_list_filter() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        for country in ["US", "India", "Germany"] {
            fx.event(1, "view", 10, Properties::new().with("$country", country))?;
        }
        fx.upload_list("countries.csv", &["US", "Germany"]);

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]);
        q.events[0].properties.push(prop(
            PropertyEntity::Event,
            "$country",
            Operator::InList,
            "countries.csv",
        ));
        let res = fx
            .provider(config::Query::default())
            .execute(Context::new(1), q)
            .await?;
        assert_eq!(res.rows, vec![vec![f(2.0)]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_idempotence() -> Result<()> {
        let fx = conditions()?;
        let provider = fx.provider(config::Query::default());
        let mut q = events(QueryType::UniqueUsers, EventsCondition::Each, &["a", "b"]);
        q.group_by.push(group_by_user("$country"));

        let first = provider.execute(Context::new(1), q.clone()).await?;
        let second = provider.execute(Context::new(1), q).await?;
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_each_with_breakdown_keeps_empty_steps() -> Result<()> {
        let fx = conditions()?;
        let provider = fx.provider(config::Query::default());
        let mut q = events(QueryType::UniqueUsers, EventsCondition::Each, &["a", "c"]);
        q.group_by.push(group_by_user("$country"));

        let res = provider.execute(Context::new(1), q.clone()).await?;
        assert_eq!(res.headers, vec![
            "event_index",
            "$country",
            "event_name",
            "aggregate"
        ]);
        assert_eq!(res.rows, vec![
            vec![Value::Integer(0), s("$none"), s("a"), f(2.0)],
            vec![Value::Integer(1), s("$none"), s("c"), f(0.0)],
        ]);

        q.to = 2 * DAY;
        q.group_by_timestamp = Some(TimeGranularity::Date);
        let res = provider.execute(Context::new(1), q).await?;
        assert_eq!(res.rows, vec![
            vec![
                Value::Integer(0),
                s("$none"),
                s("1970-01-01T00:00:00+00:00"),
                s("a"),
                f(2.0)
            ],
            vec![
                Value::Integer(0),
                s("$none"),
                s("1970-01-02T00:00:00+00:00"),
                s("a"),
                f(0.0)
            ],
            vec![
                Value::Integer(1),
                s("$none"),
                s("1970-01-01T00:00:00+00:00"),
                s("c"),
                f(0.0)
            ],
            vec![
                Value::Integer(1),
                s("$none"),
                s("1970-01-02T00:00:00+00:00"),
                s("c"),
                f(0.0)
            ],
        ]);

        Ok(())
    }

    #[rstest]
    #[case(TimeGranularity::Quarter, 0, i64::MAX)]
    #[case(TimeGranularity::Date, i64::MIN, 0)]
    #[case(TimeGranularity::Hour, 0, 10 * 365 * DAY)]
    #[tokio::test]
    async fn test_unbounded_time_series(
        #[case] granularity: TimeGranularity,
        #[case] from: i64,
        #[case] to: i64,
    ) -> Result<()> {
        let fx = conditions()?;
        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["a"]);
        q.from = from;
        q.to = to;
        q.group_by_timestamp = Some(granularity);

        let err = fx
            .provider(config::Query::default())
            .execute(Context::new(1), q)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidQuery);

        Ok(())
    }

    #[tokio::test]
    async fn test_identified_user_breakdown() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, Some("alice"), Properties::new());
        fx.user(2, Some("alice"), Properties::new());
        fx.user(3, None, Properties::new());
        for user in 1..=3 {
            fx.event(user, "view", 10 + user as i64, Properties::new())?;
        }

        let mut q = events(QueryType::UniqueUsers, EventsCondition::Any, &["view"]);
        q.group_by.push(group_by_user("$identified_user_id"));
        let res = fx
            .provider(config::Query::default())
            .execute(Context::new(1), q)
            .await?;
        assert_eq!(res.rows, vec![vec![s("alice"), f(1.0)], vec![
            s("3"),
            f(1.0)
        ]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_unique_users_coalesce_identities() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, Some("ext-1"), Properties::new());
        fx.user(2, Some("ext-1"), Properties::new());
        fx.user(3, None, Properties::new());
        for user in 1..=3 {
            fx.event(user, "view", 10, Properties::new())?;
        }
        let provider = fx.provider(config::Query::default());

        let res = provider
            .execute(
                Context::new(1),
                events(QueryType::UniqueUsers, EventsCondition::Any, &["view"]),
            )
            .await?;
        assert_eq!(res.rows, vec![vec![f(2.0)]]);

        let res = provider
            .execute(
                Context::new(1),
                events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]),
            )
            .await?;
        assert_eq!(res.rows, vec![vec![f(3.0)]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_global_filters() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        fx.user(2, None, Properties::new());
        fx.event(1, "a", 10, Properties::new().with("$country", "US"))?;
        fx.event(1, "b", 11, Properties::new().with("$country", "India"))?;
        fx.event(2, "b", 12, Properties::new().with("$country", "US"))?;
        fx.event(2, "a", 13, Properties::new())?;
        let provider = fx.provider(config::Query::default());

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["a", "b"]);
        q.global_properties.push(prop(
            PropertyEntity::Event,
            "$country",
            Operator::Equals,
            "US",
        ));
        let res = provider.execute(Context::new(1), q.clone()).await?;
        assert_eq!(res.rows, vec![vec![f(2.0)]]);

        q.condition = EventsCondition::Each;
        let res = provider.execute(Context::new(1), q).await?;
        assert_eq!(res.rows, vec![
            vec![Value::Integer(0), s("a"), f(1.0)],
            vec![Value::Integer(1), s("b"), f(1.0)],
        ]);

        Ok(())
    }

    #[tokio::test]
    async fn test_or_chained_filters() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        for (country, source) in [("US", "google"), ("India", "direct"), ("Germany", "google")] {
            fx.event(
                1,
                "view",
                10,
                Properties::new()
                    .with("$country", country)
                    .with("$source", source),
            )?;
        }
        let provider = fx.provider(config::Query::default());

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]);
        q.events[0].properties.push(prop(
            PropertyEntity::Event,
            "$country",
            Operator::Equals,
            "US",
        ));
        let mut india = prop(PropertyEntity::Event, "$country", Operator::Equals, "India");
        india.logical_op = LogicalOp::Or;
        q.events[0].properties.push(india);
        let res = provider.execute(Context::new(1), q.clone()).await?;
        assert_eq!(res.rows, vec![vec![f(2.0)]]);

        // (US or India) and google
        q.events[0].properties.push(prop(
            PropertyEntity::Event,
            "$source",
            Operator::Equals,
            "google",
        ));
        let res = provider.execute(Context::new(1), q).await?;
        assert_eq!(res.rows, vec![vec![f(1.0)]]);

        Ok(())
    }

    #[tokio::test]
    async fn test_week_and_quarter_series() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        // Fri 2021-01-01, Sun 2021-01-03, Sun 2021-01-10
        for ts in [DAY0 + 100, DAY0 + 2 * DAY, DAY0 + 9 * DAY] {
            fx.event(1, "view", ts, Properties::new())?;
        }
        // 2021-02-10, 2021-05-01, 2021-05-02
        for ts in [1612915200, 1619827200, 1619913600] {
            fx.event(1, "buy", ts, Properties::new())?;
        }
        let provider = fx.provider(config::Query::default());

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]);
        q.from = DAY0;
        q.to = DAY0 + 10 * DAY;
        q.group_by_timestamp = Some(TimeGranularity::Week);
        let res = provider.execute(Context::new(1), q).await?;
        assert_eq!(res.headers, vec!["datetime", "aggregate"]);
        assert_eq!(res.rows, vec![
            vec![s("2020-12-27T00:00:00+00:00"), f(1.0)],
            vec![s("2021-01-03T00:00:00+00:00"), f(1.0)],
            vec![s("2021-01-10T00:00:00+00:00"), f(1.0)],
        ]);

        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["buy"]);
        // 2021-01-15 .. 2021-07-01
        q.from = 1610668800;
        q.to = 1625097600;
        q.group_by_timestamp = Some(TimeGranularity::Quarter);
        let res = provider.execute(Context::new(1), q).await?;
        assert_eq!(res.rows, vec![
            vec![s("2021-01-01T00:00:00+00:00"), f(1.0)],
            vec![s("2021-04-01T00:00:00+00:00"), f(2.0)],
        ]);

        Ok(())
    }

    #[tokio::test]
    async fn test_datetime_breakdown() -> Result<()> {
        let fx = Fixture::new(1);
        fx.user(1, None, Properties::new());
        // 2021-02-10, 2021-02-11, 2021-05-01
        for ts in [1612915200i64, 1613001600, 1619827200] {
            fx.event(1, "view", 10, Properties::new().with("signed_up", ts))?;
        }

        let mut gbp = group_by_event("signed_up", "view");
        gbp.typ = PropertyType::Datetime;
        gbp.granularity = Some(TimeGranularity::Month);
        let mut q = events(QueryType::EventsOccurrence, EventsCondition::Any, &["view"]);
        q.group_by.push(gbp);

        let res = fx
            .provider(config::Query::default())
            .execute(Context::new(1), q)
            .await?;
        assert_eq!(res.rows, vec![
            vec![s("2021-02-01T00:00:00+00:00"), f(2.0)],
            vec![s("2021-05-01T00:00:00+00:00"), f(1.0)],
        ]);

        Ok(())
    }
}
