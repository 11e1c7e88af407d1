//! Tender aggregate: a published request for bids and its owned records.

mod aggregate;
mod dto;
mod entities;

pub(crate) use aggregate::TenderSnapshot;
pub use aggregate::{Tender, TenderDetails, TenderStatus, TenderType};
pub use dto::*;
pub use entities::{Deliverable, EligibilityCriteria, PaymentTerm, TenderActivity, TenderDocument};
