// WebSocket module - organized into focused submodules
//
// - handler: WebSocket upgrade handler (entry point)
// - connection: per-connection reader loop driving the relay lifecycle hooks
// - sending: per-connection writer task draining the outbound queue
// - routes: HTTP route setup (signal, health, metrics)
// - metrics: metrics endpoint and bearer authentication

mod connection;
mod handler;
mod metrics;
mod routes;
mod sending;

pub use handler::websocket_handler;
pub use metrics::{metrics_handler, MetricsAccess};
pub use routes::{build_app, create_router};
