//! Credential models: redacted secrets, access tokens, and account context.

pub mod account;
pub mod token;

pub use account::*;
pub use token::{access::*, secret::*};
