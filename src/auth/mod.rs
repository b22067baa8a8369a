//! Identity core: credentials, one-time tokens, sessions and login.

mod error;
pub mod login;
pub mod password;
pub mod sessions;
pub mod tokens;

pub use error::{AuthError, GENERIC_RETRY_MESSAGE, THROTTLED_MESSAGE};
pub use login::{authenticate, LoginError, LoginSuccess};
pub use sessions::{ResolvedSession, SessionManager};
pub use tokens::{Token, TokenManager, MAX_ISSUE_ATTEMPTS};
