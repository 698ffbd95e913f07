//! Credentials and bearer tokens.
//!
//! Passwords are stored as bcrypt hashes. Sessions use compact HS256
//! tokens (`header.payload.signature`, base64url) with separate secrets
//! for access and refresh tokens.

pub mod password;
pub mod token;

pub use password::{hash_password, verify_password, DEFAULT_COST};
pub use token::{Claims, TokenError, TokenSigner};
