//! Bid aggregate: a bidder's priced proposal against one tender.

mod aggregate;
mod dto;
mod entities;

pub(crate) use aggregate::BidSnapshot;
pub use aggregate::{Bid, BidStatus};
pub use dto::*;
pub use entities::{BidDocument, BidItem};
