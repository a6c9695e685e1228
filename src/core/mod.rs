//! Core dispatch logic.
//!
//! This module contains:
//! - IntentRouter: maps a classified intent to its handler
//! - Dispatcher: method routing and the outermost error boundary

pub mod dispatcher;
pub mod router;

// Re-export commonly used types
pub use dispatcher::{DispatchSettings, Dispatcher};
pub use router::{transit_deeplink, IntentRouter};
