//! MQTT session types and the MQTT agent.
//!
//! This module holds the values that flow between callers, the
//! [`agent`] and a per-connection [`engine`]: publish and subscribe
//! descriptions, connection options and the [`Error`] status every operation
//! completes with.
//!
//! # Key Concepts
//!
//! - **Topic**: a UTF-8 string used as the routing key of a publish
//! - **Topic filter**: a subscription pattern, optionally using the `+`
//!   (single level) and `#` (multi level) wildcards, see [`topic`]
//! - **QoS**: the delivery guarantee of a publish or subscription
//! - **Packet identifier**: the id that pairs a QoS>0 publish, subscribe or
//!   unsubscribe with its acknowledgment
//!
//! # Examples
//!
//! ```rust
//! use mqtt_agent::network::application::mqtt::{PublishInfo, QoS, SubscribeInfo};
//!
//! let reading = PublishInfo::new("sensors/42/temp", b"23.5", QoS::AtLeastOnce).unwrap();
//! assert_eq!(reading.topic.as_str(), "sensors/42/temp");
//!
//! let filter = SubscribeInfo::new("sensors/+/temp", QoS::AtLeastOnce).unwrap();
//! assert!(filter.matches(&reading.topic));
//!
//! // Wildcards are not allowed in topic names.
//! assert!(PublishInfo::new("sensors/+/temp", b"", QoS::AtMostOnce).is_err());
//! ```

use heapless::{String, Vec};

/// The command executor: queue, connection table and command loop.
pub mod agent;

/// Millisecond clock sources for protocol engines.
pub mod clock;

/// Boundary contract for per-connection protocol engines.
pub mod engine;

/// Status codes reported by the agent and protocol engines.
pub mod error;

/// Topic filter validation and matching.
pub mod topic;

pub use error::Error;

/// Maximum length of a topic name carried by a publish.
pub const TOPIC_NAME_MAX_LEN: usize = 256;

/// Maximum payload size of a publish, the size of the network buffer.
pub const PAYLOAD_MAX_LEN: usize = 1024;

/// Maximum length of a topic filter held by the subscription registry.
pub const SUBSCRIPTION_BUFFER_SIZE: usize = 100;

/// Quality of Service levels for MQTT messages.
///
/// ```rust
/// use mqtt_agent::network::application::mqtt::QoS;
///
/// assert_eq!(QoS::AtMostOnce as u8, 0);
/// assert_eq!(QoS::ExactlyOnce as u8, 2);
/// assert!(!QoS::AtMostOnce.expects_ack());
/// assert!(QoS::AtLeastOnce.expects_ack());
/// ```
#[derive(Debug, PartialEq, Eq, Clone, Copy, PartialOrd, Ord)]
pub enum QoS {
    /// At most once delivery, no acknowledgment.
    AtMostOnce = 0,
    /// At least once delivery, acknowledged by PUBACK.
    AtLeastOnce = 1,
    /// Exactly once delivery, acknowledged by PUBREC/PUBCOMP.
    ExactlyOnce = 2,
}

impl QoS {
    /// Whether a publish at this level is tracked until acknowledged.
    pub fn expects_ack(self) -> bool {
        self != QoS::AtMostOnce
    }
}

/// A publish, outgoing or incoming.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PublishInfo {
    /// Delivery guarantee.
    pub qos: QoS,
    /// Whether the broker should retain the message.
    pub retain: bool,
    /// Set on redelivery of a QoS>0 publish.
    pub dup: bool,
    /// Concrete topic name, never containing wildcards.
    pub topic: String<TOPIC_NAME_MAX_LEN>,
    /// Message payload.
    pub payload: Vec<u8, PAYLOAD_MAX_LEN>,
}

impl PublishInfo {
    /// Build a publish, validating the topic name and payload size.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - empty topic, wildcard in topic, or topic
    ///   longer than [`TOPIC_NAME_MAX_LEN`]
    /// * [`Error::NoMemory`] - payload longer than [`PAYLOAD_MAX_LEN`]
    pub fn new(topic: &str, payload: &[u8], qos: QoS) -> Result<Self, Error> {
        if !topic::is_valid_name(topic) {
            return Err(Error::BadParameter);
        }
        let topic = String::try_from(topic).map_err(|_| Error::BadParameter)?;
        let payload = Vec::from_slice(payload).map_err(|_| Error::NoMemory)?;
        Ok(Self {
            qos,
            retain: false,
            dup: false,
            topic,
            payload,
        })
    }

    /// Mark the publish as retained.
    pub fn retained(mut self) -> Self {
        self.retain = true;
        self
    }
}

/// One topic filter of a SUBSCRIBE or UNSUBSCRIBE.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct SubscribeInfo {
    /// Maximum QoS requested for deliveries on this filter.
    pub qos: QoS,
    /// The topic filter, possibly with wildcards.
    pub topic_filter: String<SUBSCRIPTION_BUFFER_SIZE>,
}

impl SubscribeInfo {
    /// Build a subscription, validating the filter syntax.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - malformed filter (misplaced wildcard, empty)
    ///   or longer than [`SUBSCRIPTION_BUFFER_SIZE`]
    pub fn new(topic_filter: &str, qos: QoS) -> Result<Self, Error> {
        if !topic::is_valid_filter(topic_filter) {
            return Err(Error::BadParameter);
        }
        let topic_filter = String::try_from(topic_filter).map_err(|_| Error::BadParameter)?;
        Ok(Self { qos, topic_filter })
    }

    /// Whether `topic` is matched by this filter.
    pub fn matches(&self, topic: &str) -> bool {
        topic::matches(&self.topic_filter, topic)
    }
}

/// Options for the MQTT CONNECT handshake.
///
/// ```rust
/// use mqtt_agent::network::application::mqtt::ConnectInfo;
///
/// let options = ConnectInfo {
///     client_id: "weather_station",
///     keep_alive_seconds: 60,
///     clean_session: false,
///     user_name: None,
///     password: None,
/// };
/// assert!(!options.clean_session);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectInfo<'a> {
    /// The client identifier, unique within the broker.
    pub client_id: &'a str,
    /// The keep-alive interval in seconds, 0 disables keep-alive.
    pub keep_alive_seconds: u16,
    /// `true` discards any session the broker holds for `client_id`;
    /// `false` asks the broker to resume it.
    pub clean_session: bool,
    /// Optional user name.
    pub user_name: Option<&'a str>,
    /// Optional password.
    pub password: Option<&'a [u8]>,
}
