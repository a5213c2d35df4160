//! Common error types for transport operations

use core::fmt;

/// A common error type for transport operations.
///
/// Transports implementing the [`network`](crate::network) traits can use
/// this enum as their associated error type. Protocol engines translate it
/// into an MQTT status with `From`, see
/// [`mqtt::Error`](crate::network::application::mqtt::Error).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// An operation was attempted on a connection that is not open.
    NotOpen,
    /// An error occurred during a write operation.
    WriteError,
    /// An error occurred during a read operation.
    ReadError,
    /// A connection attempt was refused.
    ConnectionRefused,
    /// A timeout occurred.
    Timeout,
    /// The peer closed the connection.
    ConnectionClosed,
    /// An invalid address was provided.
    InvalidAddress,
    /// A protocol-specific error occurred.
    ProtocolError,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::NotOpen => "transport is not open",
            Error::WriteError => "transport write failed",
            Error::ReadError => "transport read failed",
            Error::ConnectionRefused => "connection refused",
            Error::Timeout => "transport timed out",
            Error::ConnectionClosed => "connection closed by peer",
            Error::InvalidAddress => "invalid address",
            Error::ProtocolError => "protocol error",
        };
        f.write_str(text)
    }
}

impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::NotOpen => defmt::write!(f, "NotOpen"),
            Error::WriteError => defmt::write!(f, "WriteError"),
            Error::ReadError => defmt::write!(f, "ReadError"),
            Error::ConnectionRefused => defmt::write!(f, "ConnectionRefused"),
            Error::Timeout => defmt::write!(f, "Timeout"),
            Error::ConnectionClosed => defmt::write!(f, "ConnectionClosed"),
            Error::InvalidAddress => defmt::write!(f, "InvalidAddress"),
            Error::ProtocolError => defmt::write!(f, "ProtocolError"),
        }
    }
}
