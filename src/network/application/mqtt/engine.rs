//! The protocol engine is the MQTT codec and client state machine for one
//! connection: it builds and parses packets, allocates packet identifiers,
//! handles QoS retries and keep-alive timing, and owns the transport it was
//! bound to. The agent consumes it through [`ProtocolEngine`] and never looks
//! inside.

use super::clock::GetCurrentTimeMs;
use super::{ConnectInfo, Error, PublishInfo, SubscribeInfo};
use crate::network::Connection;

/// Acknowledgment packet types that complete a tracked command.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AckKind {
    /// Completes a SUBSCRIBE.
    Suback,
    /// Completes an UNSUBSCRIBE.
    Unsuback,
    /// Completes a QoS 1 PUBLISH.
    Puback,
    /// First acknowledgment of a QoS 2 PUBLISH.
    Pubrec,
    /// Completes a QoS 2 PUBLISH.
    Pubcomp,
}

/// Something the engine received during [`ProtocolEngine::process_loop`].
#[derive(Debug)]
pub enum IncomingEvent<'a> {
    /// A PUBLISH from the broker.
    Publish(&'a PublishInfo),
    /// An acknowledgment for an earlier SUBSCRIBE, UNSUBSCRIBE or PUBLISH.
    Ack {
        /// Which acknowledgment packet arrived.
        kind: AckKind,
        /// Identifier of the acknowledged packet.
        packet_id: u16,
        /// `Err` when the acknowledgment carries a failure code, such as a
        /// refused SUBACK.
        result: Result<(), Error>,
    },
}

/// MQTT protocol engine for a single connection.
///
/// Every method is called from the agent's thread only, except
/// [`connect`](ProtocolEngine::connect) which runs on the thread that owns the
/// agent before the command loop is started.
pub trait ProtocolEngine: Send + Sized {
    /// The byte-stream the engine reads and writes through.
    type Transport: Connection + Send;

    /// Create an engine bound to `transport`, measuring timeouts with `clock`.
    fn bind(transport: Self::Transport, clock: GetCurrentTimeMs) -> Result<Self, Error>;

    /// Perform the CONNECT/CONNACK handshake, waiting at most `timeout_ms`
    /// for the CONNACK. Returns the broker's session-present flag.
    fn connect(
        &mut self,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo>,
        timeout_ms: u32,
    ) -> Result<bool, Error>;

    /// Send a SUBSCRIBE for `subscriptions`, returning its packet identifier.
    fn subscribe(&mut self, subscriptions: &[SubscribeInfo]) -> Result<u16, Error>;

    /// Send an UNSUBSCRIBE for `subscriptions`, returning its packet identifier.
    fn unsubscribe(&mut self, subscriptions: &[SubscribeInfo]) -> Result<u16, Error>;

    /// Send a PUBLISH. Returns the packet identifier for QoS>0, `None` for QoS 0.
    fn publish(&mut self, publish: &PublishInfo) -> Result<Option<u16>, Error>;

    /// Resend an in-flight PUBLISH under its original packet identifier.
    fn republish(&mut self, publish: &PublishInfo, packet_id: u16) -> Result<(), Error>;

    /// Receive and handle at most one packet, waiting up to `timeout_ms`.
    ///
    /// Inbound publishes and acknowledgments are reported through `on_event`
    /// before this returns. Receiving nothing is not an error.
    fn process_loop(
        &mut self,
        timeout_ms: u32,
        on_event: &mut dyn FnMut(IncomingEvent<'_>),
    ) -> Result<(), Error>;

    /// Send a PINGREQ. The PINGRESP is handled internally.
    fn ping(&mut self) -> Result<(), Error>;

    /// Send a DISCONNECT.
    fn disconnect(&mut self) -> Result<(), Error>;

    /// Release the engine and close its transport.
    fn release(self) -> Result<(), Error>;
}
