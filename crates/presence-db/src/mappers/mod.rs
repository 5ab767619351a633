//! Entity to model mappers
//!
//! - `TryFrom<EdgeModel> for ConnectionEdge`: rows back into domain objects
//! - [`EdgeInsert`]: owned column values for binding an insert

mod edge;

pub use edge::EdgeInsert;
