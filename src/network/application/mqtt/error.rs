//! Status codes for MQTT agent operations.
//!
//! Every command completes with `Result<(), Error>`. The first group of
//! variants mirrors what a protocol engine reports; the second group is
//! produced by the agent itself while validating or tracking commands.

use core::fmt;

use crate::network::error::Error as NetworkError;

/// Failure status of an MQTT operation.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Error {
    /// Malformed parameters: invalid handle, topic, filter or options.
    BadParameter,
    /// A buffer is too small for the packet to send or receive.
    NoMemory,
    /// The transport failed to send.
    SendFailed,
    /// The transport failed to receive.
    RecvFailed,
    /// The broker sent a malformed or unexpected packet.
    BadResponse,
    /// The broker refused the connection or a subscription.
    ServerRefused,
    /// No data arrived before the timeout.
    NoDataAvailable,
    /// The operation is not valid in the current session state.
    IllegalState,
    /// The broker did not answer a keep-alive in time.
    KeepAliveTimeout,

    /// The connection handle is out of range or not active.
    NotFound,
    /// The subscription registry has no room for the requested filters.
    SubscriptionsFull,
    /// The pending-acknowledgment table has no room for another entry.
    PendingAcksFull,
    /// The command was abandoned by a disconnect, free or clean session
    /// before its acknowledgment arrived.
    Canceled,
}

impl Error {
    /// Whether the failure means the session's transport is gone.
    ///
    /// A fatal failure stops [`Agent::command_loop`](super::agent::Agent::command_loop),
    /// which reports the affected connection to the embedder.
    pub fn is_fatal(self) -> bool {
        matches!(
            self,
            Error::SendFailed | Error::RecvFailed | Error::KeepAliveTimeout
        )
    }
}

impl From<NetworkError> for Error {
    fn from(error: NetworkError) -> Self {
        match error {
            NetworkError::WriteError => Error::SendFailed,
            NetworkError::NotOpen | NetworkError::ReadError | NetworkError::ConnectionClosed => {
                Error::RecvFailed
            }
            NetworkError::Timeout => Error::NoDataAvailable,
            NetworkError::ConnectionRefused => Error::ServerRefused,
            NetworkError::InvalidAddress => Error::BadParameter,
            NetworkError::ProtocolError => Error::BadResponse,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Error::BadParameter => "bad parameter",
            Error::NoMemory => "buffer too small",
            Error::SendFailed => "send failed",
            Error::RecvFailed => "receive failed",
            Error::BadResponse => "bad response from broker",
            Error::ServerRefused => "refused by broker",
            Error::NoDataAvailable => "no data available before timeout",
            Error::IllegalState => "illegal session state",
            Error::KeepAliveTimeout => "keep-alive timeout",
            Error::NotFound => "connection not found",
            Error::SubscriptionsFull => "subscription registry full",
            Error::PendingAcksFull => "pending acknowledgment table full",
            Error::Canceled => "canceled",
        };
        f.write_str(text)
    }
}

impl std::error::Error for Error {}

#[cfg(feature = "defmt")]
impl defmt::Format for Error {
    fn format(&self, f: defmt::Formatter) {
        match self {
            Error::BadParameter => defmt::write!(f, "BadParameter"),
            Error::NoMemory => defmt::write!(f, "NoMemory"),
            Error::SendFailed => defmt::write!(f, "SendFailed"),
            Error::RecvFailed => defmt::write!(f, "RecvFailed"),
            Error::BadResponse => defmt::write!(f, "BadResponse"),
            Error::ServerRefused => defmt::write!(f, "ServerRefused"),
            Error::NoDataAvailable => defmt::write!(f, "NoDataAvailable"),
            Error::IllegalState => defmt::write!(f, "IllegalState"),
            Error::KeepAliveTimeout => defmt::write!(f, "KeepAliveTimeout"),
            Error::NotFound => defmt::write!(f, "NotFound"),
            Error::SubscriptionsFull => defmt::write!(f, "SubscriptionsFull"),
            Error::PendingAcksFull => defmt::write!(f, "PendingAcksFull"),
            Error::Canceled => defmt::write!(f, "Canceled"),
        }
    }
}
