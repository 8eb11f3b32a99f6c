pub mod config;
pub mod error;
pub mod query;
pub mod types;

pub use types::PropValue;
pub use types::Properties;

pub type ProjectId = u64;
pub type UserId = u64;
pub type EventNameId = u64;
