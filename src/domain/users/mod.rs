//! User aggregate: registered participants and their refresh tokens.

mod aggregate;
mod dto;

pub(crate) use aggregate::UserSnapshot;
pub use aggregate::{CompanyDetails, RefreshToken, User, UserProfile, UserRole};
pub use dto::*;
