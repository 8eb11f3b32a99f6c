use std::net::SocketAddr;
use std::path::PathBuf;

use clap::ValueEnum;
use common::config::AllOccurrencePolicy;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing::Level;

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Server {
    pub host: Option<SocketAddr>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Data {
    pub fixtures: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Query {
    pub max_concurrency: Option<usize>,
    /// Humantime duration, e.g. "60s" or "2m".
    pub timeout: Option<String>,
    pub numeric_buckets: Option<usize>,
    pub all_occurrence_policy: Option<AllOccurrencePolicy>,
    pub results_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Cache {
    pub capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Log {
    pub level: Option<LogLevel>,
}

/// Raw file/env configuration, every key is optional.
#[derive(Debug, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub server: Server,
    pub data: Data,
    pub query: Query,
    pub cache: Cache,
    pub log: Log,
}

impl TryInto<common::config::Config> for Config {
    type Error = crate::error::Error;

    fn try_into(self) -> Result<common::config::Config, Self::Error> {
        let def = common::config::Config::default();
        let timeout = match self.query.timeout {
            Some(v) => humantime::parse_duration(v.as_str())?,
            None => def.query.timeout,
        };

        Ok(common::config::Config {
            server: common::config::Server {
                host: self.server.host.unwrap_or(def.server.host),
            },
            data: common::config::Data {
                fixtures: self.data.fixtures,
            },
            query: common::config::Query {
                max_concurrency: self
                    .query
                    .max_concurrency
                    .unwrap_or(def.query.max_concurrency),
                timeout,
                numeric_buckets: self
                    .query
                    .numeric_buckets
                    .unwrap_or(def.query.numeric_buckets),
                all_occurrence_policy: self
                    .query
                    .all_occurrence_policy
                    .unwrap_or(def.query.all_occurrence_policy),
                results_limit: self.query.results_limit.unwrap_or(def.query.results_limit),
            },
            cache: common::config::Cache {
                capacity: self.cache.capacity.unwrap_or(def.cache.capacity),
            },
            log: common::config::Log {
                level: self.log.level.map(Into::into).unwrap_or(def.log.level),
            },
        })
    }
}

#[derive(Deserialize, Copy, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum LogLevel {
    #[serde(rename = "trace")]
    Trace,
    #[serde(rename = "debug")]
    Debug,
    #[serde(rename = "info")]
    Info,
    #[serde(rename = "warn")]
    Warn,
    #[serde(rename = "error")]
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
        .into()
    }
}
