//! briq-connect: reconciliation service between a commerce platform and the
//! Briq payment gateway.
//!
//! The gateway notifies us of order, capture and refund status changes over
//! webhooks; this crate authenticates those notifications, maps gateway
//! statuses onto the platform's transaction state machine and applies them to
//! the payment aggregate exactly once. It also keeps the gateway checkout
//! session in step with the cart it was created for.

pub mod api;
pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod platform;
pub mod services;
