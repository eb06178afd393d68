//! Token types persisted by the [`TokenStore`](crate::store::TokenStore).

pub mod access;
pub mod secret;
