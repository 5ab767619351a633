//! Session verification

mod jwt;
mod session;

pub use jwt::{Claims, JwtService};
pub use session::{Session, SessionVerifier};
