//! Voice Bridge Library Crate
//!
//! This library contains all the logic for the voice bridge service: the
//! startup configuration, the Axum router, and the WebSocket bridge that
//! pairs each browser client with one Gemini Live session. The `bridge`
//! binary is a thin wrapper around this library.

pub mod config;
pub mod router;
pub mod state;
pub mod ws;
