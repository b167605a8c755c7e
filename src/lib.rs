#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions
)]

//! # Signal Relay
//!
//! A minimal, in-memory WebSocket signaling relay for peer-to-peer video calls.
//!
//! Every text or binary frame a participant sends is forwarded verbatim to all
//! other connected participants. There are no rooms, no authentication and no
//! persistence: one process, one broadcast group.

/// Signal payloads and per-recipient delivery reports
pub mod broadcast;

/// Relay configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Relay counters
pub mod metrics;

/// Connection registry and broadcast fan-out
pub mod server;

/// WebSocket connection handling and HTTP routes
pub mod websocket;
