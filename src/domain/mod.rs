//! Domain types and DTOs
//!
//! Aggregates, value objects and the transport shapes built from them.
//! Nothing in here touches storage or HTTP.

pub mod audit;
pub mod bids;
pub mod documents;
pub mod dto;
pub mod errors;
pub mod events;
pub mod tenders;
pub mod users;
pub mod value_objects;

// Re-export commonly used types
pub use audit::{AuditInfo, AuditStamp};
pub use bids::*;
pub use documents::*;
pub use dto::*;
pub use errors::{DomainError, DomainResult, ErrorKind};
pub use events::DomainEvent;
pub use tenders::*;
pub use users::*;
pub use value_objects::{Address, Email, Money};
