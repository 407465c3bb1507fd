//! UI layer: HTTP / WebSocket endpoints and background consumers.

pub mod consumer;
mod handler;
mod server;
mod signal;
pub mod state;

pub use server::Server;
pub use signal::shutdown_signal;
