pub mod error;
pub mod event_names;
pub mod lists;
pub mod metadata;

pub use error::Result;

pub use crate::metadata::MetadataProvider;
