//! Business logic: routing webhook deliveries, reconciling gateway facts into
//! platform payments, and keeping carts bound to gateway sessions.

pub mod event_router;
pub mod reconciler;
pub mod session_sync;
pub mod webhook_processor;
