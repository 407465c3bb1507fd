//! Data Transfer Objects (DTOs) for the chat service.
//!
//! DTOs are organized by protocol:
//! - `websocket`: WebSocket frames
//! - `http`: HTTP API bodies
//! - `queue`: message queue payloads shared with other services
//! - `broker`: the envelope carried on room channels

pub mod broker;
pub mod conversion;
pub mod http;
pub mod queue;
pub mod websocket;
