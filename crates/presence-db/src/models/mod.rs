//! Database models
//!
//! SQLx `FromRow` structs mirroring table rows.

mod edge;

pub use edge::{EdgeModel, GroupRowModel};
