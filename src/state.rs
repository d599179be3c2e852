//! Shared Application State
//!
//! The bridge keeps no mutable cross-session state; the only thing sessions
//! share is the immutable startup configuration.

use crate::config::Config;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
}
