//! The command queue: a bounded multi-producer, single-consumer FIFO.
//!
//! Producers are [`AgentHandle`]s on any thread. The only consumer is the
//! agent, which also keeps one producer of its own to re-arm PROCESS_LOOP.

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError};

use super::command::{Command, ConnectionHandle, SubscribeList};
use crate::network::application::mqtt::{Error, PublishInfo};

/// Why a command could not be queued. Nothing was mutated.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubmitError {
    /// The queue stayed full for the whole wait budget.
    QueueFull,
    /// The agent has been dropped.
    AgentStopped,
}

impl fmt::Display for SubmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmitError::QueueFull => f.write_str("command queue is full"),
            SubmitError::AgentStopped => f.write_str("agent is no longer running"),
        }
    }
}

impl std::error::Error for SubmitError {}

/// Consumer side, owned by the agent.
#[derive(Debug)]
pub(crate) struct CommandQueue {
    commands: Receiver<Command>,
    rearm: Sender<Command>,
}

impl CommandQueue {
    /// Block until the next command arrives.
    ///
    /// Returns `None` only if every producer is gone, which cannot happen
    /// while the queue itself holds the re-arm producer.
    pub(crate) fn take(&self) -> Option<Command> {
        self.commands.recv().ok()
    }

    /// Non-blocking enqueue from the agent thread itself.
    pub(crate) fn requeue(&self, command: Command) -> Result<(), SubmitError> {
        self.rearm.try_send(command).map_err(|error| match error {
            TrySendError::Full(_) => SubmitError::QueueFull,
            TrySendError::Disconnected(_) => SubmitError::AgentStopped,
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.commands.len()
    }
}

/// Producer side of the command queue.
///
/// Cheap to clone and safe to share between threads. Every method returns as
/// soon as the command is queued; the outcome arrives later through the
/// command's completion callback, called on the agent thread.
#[derive(Debug, Clone)]
pub struct AgentHandle {
    commands: Sender<Command>,
    wait: Duration,
    process_loop_timeout_ms: u32,
}

pub(crate) fn channel(
    capacity: usize,
    wait: Duration,
    process_loop_timeout_ms: u32,
) -> (CommandQueue, AgentHandle) {
    let (sender, receiver) = crossbeam_channel::bounded(capacity);
    let queue = CommandQueue {
        commands: receiver,
        rearm: sender.clone(),
    };
    let handle = AgentHandle {
        commands: sender,
        wait,
        process_loop_timeout_ms,
    };
    (queue, handle)
}

impl AgentHandle {
    /// Queue `command`, waiting up to the configured budget for space.
    ///
    /// # Errors
    ///
    /// * [`SubmitError::QueueFull`] - still full after the wait budget; the
    ///   command was dropped and its callback will not run
    /// * [`SubmitError::AgentStopped`] - the agent no longer exists
    pub fn submit(&self, command: Command) -> Result<(), SubmitError> {
        self.commands
            .send_timeout(command, self.wait)
            .map_err(|error| match error {
                SendTimeoutError::Timeout(_) => SubmitError::QueueFull,
                SendTimeoutError::Disconnected(_) => SubmitError::AgentStopped,
            })
    }

    /// Subscribe to `subscriptions`, routing matching publishes to `on_publish`.
    ///
    /// `on_complete` runs once the SUBACK arrives, or earlier with the failure
    /// if the command is rejected.
    pub fn subscribe<P, F>(
        &self,
        handle: ConnectionHandle,
        subscriptions: SubscribeList,
        on_publish: P,
        on_complete: F,
    ) -> Result<(), SubmitError>
    where
        P: Fn(&PublishInfo) + Send + Sync + 'static,
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.submit(
            Command::subscribe(handle, subscriptions, Arc::new(on_publish)).on_complete(on_complete),
        )
    }

    /// Unsubscribe from `subscriptions`; completes on UNSUBACK.
    pub fn unsubscribe<F>(
        &self,
        handle: ConnectionHandle,
        subscriptions: SubscribeList,
        on_complete: F,
    ) -> Result<(), SubmitError>
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.submit(Command::unsubscribe(handle, subscriptions).on_complete(on_complete))
    }

    /// Publish `publish`; QoS 0 completes once sent, QoS>0 on acknowledgment.
    pub fn publish<F>(
        &self,
        handle: ConnectionHandle,
        publish: PublishInfo,
        on_complete: F,
    ) -> Result<(), SubmitError>
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.submit(Command::publish(handle, publish).on_complete(on_complete))
    }

    /// Start polling the connection with the configured process-loop timeout.
    ///
    /// `on_complete` runs after the first iteration; later iterations are
    /// re-armed by the agent without a callback. A connection keeps a single
    /// re-armed poll, so submitting this again while polling runs one extra
    /// iteration and starts no second chain.
    pub fn process_loop<F>(&self, handle: ConnectionHandle, on_complete: F) -> Result<(), SubmitError>
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.submit(
            Command::process_loop(handle, self.process_loop_timeout_ms).on_complete(on_complete),
        )
    }

    /// Send a keep-alive.
    pub fn ping<F>(&self, handle: ConnectionHandle, on_complete: F) -> Result<(), SubmitError>
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.submit(Command::ping(handle).on_complete(on_complete))
    }

    /// Disconnect from the broker. Outstanding acknowledgments are abandoned.
    pub fn disconnect<F>(&self, handle: ConnectionHandle, on_complete: F) -> Result<(), SubmitError>
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.submit(Command::disconnect(handle).on_complete(on_complete))
    }

    /// Release the connection slot so it can be initialized again.
    pub fn free<F>(&self, handle: ConnectionHandle, on_complete: F) -> Result<(), SubmitError>
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.submit(Command::free(handle).on_complete(on_complete))
    }

    /// Ask the command loop to return.
    pub fn terminate(&self) -> Result<(), SubmitError> {
        self.submit(Command::terminate())
    }

    /// Number of commands waiting in the queue.
    pub fn num_waiting(&self) -> usize {
        self.commands.len()
    }
}
