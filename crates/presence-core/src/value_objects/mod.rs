//! Value objects - immutable types that represent domain concepts

mod ids;

pub use ids::{IdParseError, TenantId, UserId, MAX_ID_LEN};
