pub mod bucket;
pub mod cache;
pub mod context;
pub mod error;
pub mod events;
pub mod filter;
pub mod funnel;
pub mod identity;
pub mod plan;
pub mod provider;
pub mod result;
pub mod test_util;

pub use cache::ResultCache;
pub use context::Context;
pub use error::Result;
pub use provider::QueryProvider;
pub use result::QueryResult;
pub use result::ResultGroup;
pub use result::Value;
