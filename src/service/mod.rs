//! Use cases.
//!
//! Services own the business rules and talk to storage only through the
//! store traits. They are synchronous; the HTTP layer runs them on the
//! blocking pool.

pub mod typing;
pub mod users;

pub use typing::TypingService;
pub use users::UserService;
