//! Agent tuning knobs.

use core::time::Duration;

use serde::Deserialize;

use crate::network::application::mqtt::Error;

/// Default timeout handed to every PROCESS_LOOP iteration.
pub const PROCESS_LOOP_TIMEOUT_MS: u32 = 0;

/// Default time a producer waits for room in a full command queue.
pub const QUEUE_WAIT_TIME_MS: u32 = 1000;

/// Default capacity of the command queue.
pub const COMMAND_QUEUE_LENGTH: usize = 25;

/// Configuration of an [`Agent`](super::Agent).
///
/// Every field is optional when loading from JSON:
///
/// ```rust
/// use mqtt_agent::network::application::mqtt::agent::AgentConfig;
///
/// let config = AgentConfig::from_json(br#"{"queue_length": 8}"#).unwrap();
/// assert_eq!(config.queue_length, 8);
/// assert_eq!(config.queue_wait_ms, 1000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Capacity of the command queue.
    pub queue_length: usize,
    /// How long a producer waits for room before giving up.
    pub queue_wait_ms: u32,
    /// Receive timeout of every PROCESS_LOOP iteration.
    pub process_loop_timeout_ms: u32,
    /// Complete abandoned acknowledgments with [`Error::Canceled`] instead of
    /// dropping their callbacks.
    pub notify_abandoned: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            queue_length: COMMAND_QUEUE_LENGTH,
            queue_wait_ms: QUEUE_WAIT_TIME_MS,
            process_loop_timeout_ms: PROCESS_LOOP_TIMEOUT_MS,
            notify_abandoned: true,
        }
    }
}

impl AgentConfig {
    /// Parse a JSON object, filling absent fields with their defaults.
    ///
    /// # Errors
    ///
    /// [`Error::BadParameter`] for malformed JSON, unknown fields or a zero
    /// queue length.
    pub fn from_json(json: &[u8]) -> Result<Self, Error> {
        let (config, _) =
            serde_json_core::from_slice::<AgentConfig>(json).map_err(|_| Error::BadParameter)?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn validate(&self) -> Result<(), Error> {
        if self.queue_length == 0 {
            return Err(Error::BadParameter);
        }
        Ok(())
    }

    /// The producer wait budget as a [`Duration`].
    pub fn queue_wait(&self) -> Duration {
        Duration::from_millis(u64::from(self.queue_wait_ms))
    }
}
