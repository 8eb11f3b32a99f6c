pub mod error;
pub mod http;
pub mod provider;
pub mod queries;

pub use error::PlatformError;
pub use error::Result;
pub use provider::PlatformProvider;
