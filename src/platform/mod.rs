//! The commerce-platform collaborator: data model and the versioned REST
//! client the reconciler and session sync write through.

pub mod client;
pub mod types;
