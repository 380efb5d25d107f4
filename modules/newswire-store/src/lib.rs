pub mod memory;
pub mod pg;
pub mod store;

pub use memory::MemoryStore;
pub use pg::PgStore;
pub use store::{ArticleStore, Result, StoreError};
