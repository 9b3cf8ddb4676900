pub mod event_repo;
pub mod help_repo;
pub mod idempotency;
pub mod push_repo;
pub mod report_repo;
pub mod schema;
pub mod store;
pub mod util;

pub use store::DbStore;
