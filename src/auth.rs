//! Secrets, access-token records, and the single-slot token cache.

pub mod cache;
pub mod secret;
pub mod token;

pub use cache::*;
pub use secret::*;
pub use token::*;
