//! # Application Layer Protocols
//!
//! Application layer (OSI Layer 7) protocols built on the
//! [`Connection`](crate::network::Connection) transport traits.
//!
//! ## Available Protocols
//!
//! - **[`mqtt`]**: MQTT session types and the single-worker MQTT agent
//!
//! ## Design Principles
//!
//! - **Connection Agnostic**: Work with any type implementing [`Connection`](crate::network::Connection)
//! - **Resource Conscious**: Fixed-capacity tables and buffers sized by constants
//! - **Error Handling**: Every failure is reported as a typed status, never a panic

/// MQTT agent and supporting types.
///
/// Serializes all operations against one or more MQTT client sessions through
/// a single worker thread.
pub mod mqtt;
