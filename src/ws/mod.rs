//! WebSocket Session Bridging
//!
//! This module contains the core logic of the service: pairing each browser
//! client connection with one Gemini Live session. It is structured into
//! submodules for clarity:
//!
//! - `protocol`: Defines the inbound control frames and their translation to
//!   upstream payloads.
//! - `upstream`: The Gemini Live wire types and the outbound connector.
//! - `session`: The per-connection bridge state machine and its event loop.

pub mod protocol;
pub mod session;
pub mod upstream;

pub use session::ws_handler;
