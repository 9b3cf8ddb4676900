pub mod error;
pub mod events;
pub mod help;
pub mod push;
pub mod reconciliation;
pub mod repair;
pub mod reports;
pub mod store;
pub mod valet;
pub mod validation;

pub mod types;

pub use crate::error::ValetError;
pub use crate::store::Store;
pub use crate::valet::{RequestContext, Valet};
