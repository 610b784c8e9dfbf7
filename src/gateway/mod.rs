//! Everything that speaks the Briq gateway's wire language: payload types,
//! webhook signature verification, status mapping, snapshot normalization and
//! the REST client.

pub mod client;
pub mod http;
pub mod session;
pub mod signature;
pub mod status;
pub mod types;
