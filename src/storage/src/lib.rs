pub mod error;
pub mod memory;
pub mod records;
pub mod store;

pub use memory::MemoryStore;
pub use records::Event;
pub use records::User;
pub use store::Store;
