//! Database models split into domain-specific modules.

pub mod session;
pub mod token;
pub mod user;

pub use session::*;
pub use token::*;
pub use user::*;
