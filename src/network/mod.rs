//! Transport binding for protocol engines.
//!
//! A protocol engine owns one byte-stream connection (TCP socket, TLS session,
//! UART bridge...) and talks to it through the traits in this module. The MQTT
//! agent hands a transport to [`ProtocolEngine::bind`] at init time and never
//! touches it again; everything above this layer is transport agnostic.
//!
//! [`ProtocolEngine::bind`]: application::mqtt::engine::ProtocolEngine::bind

#![allow(missing_docs)]

/// Common error types for transport operations
pub mod error;

/// Application layer protocols built on the transport traits.
pub mod application;

/// Re-exports of common traits
pub mod prelude {
    pub use super::{Close, Connection, Read, Write};
}

/// Byte-stream receive primitive.
pub trait Read {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Read available bytes into `buf`, returning how many were read.
    ///
    /// `Ok(0)` means nothing was available before the transport's own
    /// timeout elapsed.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;
}

/// Byte-stream send primitive.
pub trait Write {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Write as much of `buf` as the transport accepts.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error>;
    /// Push buffered bytes onto the wire.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

pub trait Close {
    /// Associated error type
    type Error: core::fmt::Debug;
    /// Tear down the transport.
    fn close(self) -> Result<(), Self::Error>;
}

/// A full-duplex transport a protocol engine can be bound to.
pub trait Connection: Read + Write + Close {}
