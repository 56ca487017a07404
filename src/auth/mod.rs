//! Authentication: password hashing, JWT issuance, and route guards.

pub mod extract;
pub mod handlers;
pub mod password;
pub mod token;

pub use extract::{AuthClaims, RefreshClaims};
pub use token::{Claims, Identity, TokenBundle};
