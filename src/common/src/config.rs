use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone)]
pub struct Server {
    pub host: SocketAddr,
}

#[derive(Debug, Clone, Default)]
pub struct Data {
    pub fixtures: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Log {
    pub level: LevelFilter,
}

/// Which occurrences count toward an `all_given_event` occurrence total.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllOccurrencePolicy {
    /// Every matching event of an identity that satisfied all steps.
    #[default]
    AllEvents,
    /// One occurrence per step, the first match, per qualifying identity.
    FirstMatch,
}

#[derive(Debug, Clone)]
pub struct Query {
    pub max_concurrency: usize,
    pub timeout: Duration,
    pub numeric_buckets: usize,
    pub all_occurrence_policy: AllOccurrencePolicy,
    pub results_limit: usize,
}

impl Default for Query {
    fn default() -> Self {
        Query {
            max_concurrency: 4,
            timeout: Duration::from_secs(60),
            numeric_buckets: 10,
            all_occurrence_policy: AllOccurrencePolicy::AllEvents,
            results_limit: 10000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Cache {
    pub capacity: usize,
}

impl Default for Cache {
    fn default() -> Self {
        Cache { capacity: 1024 }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: Server,
    pub data: Data,
    pub query: Query,
    pub cache: Cache,
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: Server {
                host: SocketAddr::from(([0, 0, 0, 0], 8080)),
            },
            data: Data::default(),
            query: Query::default(),
            cache: Cache::default(),
            log: Log {
                level: LevelFilter::INFO,
            },
        }
    }
}
