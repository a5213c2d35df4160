//! The MQTT agent: one worker that owns every connection's session state and
//! executes commands submitted from any thread, in submission order.
//!
//! # Lifecycle of a connection slot
//!
//! ```text
//!   Empty ──init──▶ Active ──DISCONNECT──▶ Disconnected
//!     ▲               │  ▲                     │
//!     │               │  └──────connect────────┤
//!     └─────FREE──────┴────────────FREE────────┘
//! ```
//!
//! [`Agent::init`], [`Agent::connect`] and [`Agent::resume_session`] run on
//! the thread that owns the agent. Everything else goes through an
//! [`AgentHandle`] and is executed by [`Agent::command_loop`].
//!
//! # Completion
//!
//! Every submitted command completes exactly once through its callback:
//!
//! - QoS 0 publishes, PING, PROCESS_LOOP, DISCONNECT and FREE complete as
//!   soon as they ran.
//! - SUBSCRIBE, UNSUBSCRIBE and QoS>0 publishes complete when the matching
//!   acknowledgment arrives during a later PROCESS_LOOP.
//! - Commands still waiting for an acknowledgment when their connection is
//!   disconnected or freed complete with [`Error::Canceled`], unless
//!   [`AgentConfig::notify_abandoned`] is off.
//! - Commands for a handle that is out of range or not active complete with
//!   [`Error::NotFound`] without touching the connection.

use core::fmt;
use core::ops::ControlFlow;
use std::sync::Arc;

use log::{debug, error, info, warn};

mod command;
mod config;
mod connection;
mod pending;
mod queue;
mod subscriptions;

pub use command::{
    Command, CommandCallback, CommandKind, ConnectionHandle, PublishCallback, SubscribeList,
};
pub use config::{AgentConfig, COMMAND_QUEUE_LENGTH, PROCESS_LOOP_TIMEOUT_MS, QUEUE_WAIT_TIME_MS};
pub use queue::{AgentHandle, SubmitError};

use command::{Request, complete};
use connection::{Ack, ConnectionTable};
use pending::PendingAck;
use queue::CommandQueue;

use super::clock::GetCurrentTimeMs;
use super::engine::ProtocolEngine;
use super::{ConnectInfo, Error, PublishInfo};

/// Number of connection slots.
pub const MAX_CONNECTIONS: usize = 2;

/// Commands per connection that can wait for an acknowledgment at once.
pub const PENDING_ACKS_MAX_SIZE: usize = 20;

/// Topic filters per connection.
pub const SUBSCRIPTIONS_MAX_COUNT: usize = 10;

/// The command executor.
///
/// Owns the connection table and the consuming end of the command queue.
/// Move it to a worker thread and call [`command_loop`](Agent::command_loop)
/// there; the loop returns the agent's borrow on termination or on a fatal
/// connection error, so the embedder can reconnect and start it again.
pub struct Agent<E: ProtocolEngine> {
    connections: ConnectionTable<E>,
    queue: CommandQueue,
    config: AgentConfig,
}

impl<E: ProtocolEngine> fmt::Debug for Agent<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Agent")
            .field("config", &self.config)
            .field("waiting", &self.queue.len())
            .finish_non_exhaustive()
    }
}

impl<E: ProtocolEngine> Agent<E> {
    /// Create an agent with every slot empty, and the handle producers use to
    /// reach it. A zero `queue_length` is raised to one.
    pub fn new(config: AgentConfig) -> (Self, AgentHandle) {
        let capacity = config.queue_length.max(1);
        let (queue, handle) =
            queue::channel(capacity, config.queue_wait(), config.process_loop_timeout_ms);
        let agent = Self {
            connections: ConnectionTable::new(),
            queue,
            config,
        };
        (agent, handle)
    }

    /// Bind `handle` to a fresh protocol engine over `transport`.
    ///
    /// Publishes that match no subscription are handed to `unknown_publish`.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - `handle` is out of range
    /// * [`Error::IllegalState`] - the slot is already in use
    /// * whatever the engine reports while binding
    pub fn init<F>(
        &mut self,
        handle: ConnectionHandle,
        transport: E::Transport,
        clock: GetCurrentTimeMs,
        unknown_publish: F,
    ) -> Result<(), Error>
    where
        F: Fn(&PublishInfo) + Send + Sync + 'static,
    {
        let connection = self
            .connections
            .slot_mut(handle)
            .ok_or(Error::BadParameter)?;
        connection.bind(transport, clock, Arc::new(unknown_publish))?;
        info!("{handle} initialized");
        Ok(())
    }

    /// Run the CONNECT handshake for `handle` on the calling thread.
    ///
    /// Returns the broker's session-present flag, to be handed to
    /// [`resume_session`](Agent::resume_session). A disconnected slot becomes
    /// active again.
    ///
    /// # Errors
    ///
    /// * [`Error::BadParameter`] - `handle` is out of range or not initialized
    /// * the engine's status if the handshake fails
    pub fn connect(
        &mut self,
        handle: ConnectionHandle,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo>,
        timeout_ms: u32,
    ) -> Result<bool, Error> {
        let connection = self
            .connections
            .slot_mut(handle)
            .filter(|connection| connection.is_bound())
            .ok_or(Error::BadParameter)?;
        connection.connect(info, will, timeout_ms).inspect_err(|error| {
            warn!("{handle} connect failed: {error}");
        })
    }

    /// Recover session state after [`connect`](Agent::connect).
    ///
    /// With a session present, in-flight publishes are sent again with the
    /// DUP flag. Without one, every registered filter is subscribed again.
    /// Stops at the first engine failure.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] - `handle` is out of range or not active
    /// * the first engine status that is not a success
    pub fn resume_session(
        &mut self,
        handle: ConnectionHandle,
        session_present: bool,
    ) -> Result<(), Error> {
        let notify = self.config.notify_abandoned;
        let connection = self.connections.active_mut(handle)?;
        connection.resume(session_present, notify).inspect_err(|error| {
            warn!("{handle} session resume failed: {error}");
        })
    }

    /// Execute queued commands until TERMINATE or a fatal connection error.
    ///
    /// Returns `None` after TERMINATE, or the handle of the connection whose
    /// transport or keep-alive failed. Commands still queued stay queued for
    /// the next run.
    pub fn command_loop(&mut self) -> Option<ConnectionHandle> {
        info!("command loop started");
        loop {
            let Some(command) = self.queue.take() else {
                // Unreachable while the queue holds its own producer.
                return None;
            };
            if let ControlFlow::Break(failed) = self.process_command(command) {
                return failed;
            }
        }
    }

    fn process_command(&mut self, command: Command) -> ControlFlow<Option<ConnectionHandle>> {
        let Command {
            handle,
            request,
            on_complete,
        } = command;
        let kind = request.kind();
        debug!("processing {kind:?} for {handle}");

        if kind == CommandKind::Terminate {
            info!("command loop terminated");
            complete(on_complete, Ok(()));
            return ControlFlow::Break(None);
        }

        if let Request::ProcessLoop { rearmed: true, .. } = request {
            if let Some(connection) = self.connections.slot_mut(handle) {
                connection.poll_armed = false;
            }
        }

        let notify = self.config.notify_abandoned;
        let slot = self.connections.slot_mut(handle).filter(|connection| {
            if kind == CommandKind::Free {
                connection.is_bound()
            } else {
                connection.is_active()
            }
        });
        let Some(connection) = slot else {
            warn!("{kind:?} rejected: {handle} is not active");
            complete(on_complete, Err(Error::NotFound));
            return ControlFlow::Continue(());
        };

        let mut rearm = None;
        let outcome = match request {
            Request::Subscribe {
                subscriptions,
                on_publish,
            } => connection.subscribe(&subscriptions, &on_publish),
            Request::Unsubscribe { subscriptions } => connection.unsubscribe(&subscriptions),
            Request::Publish(publish) => connection.publish(publish),
            Request::ProcessLoop { timeout_ms, .. } => {
                rearm = Some(timeout_ms);
                connection.process_loop(timeout_ms).map(|()| Ack::None)
            }
            Request::Ping => connection.ping().map(|()| Ack::None),
            Request::Disconnect => {
                info!("{handle} disconnecting");
                connection.disconnect(notify).map(|()| Ack::None)
            }
            Request::Free => {
                info!("{handle} released");
                connection.release(notify).map(|()| Ack::None)
            }
            Request::Terminate => Ok(Ack::None),
        };

        let result = match outcome {
            Ok(Ack::Expected {
                packet_id,
                kind,
                publish,
                rollback,
            }) => {
                let pending = PendingAck {
                    packet_id,
                    kind,
                    on_complete,
                    publish,
                    rollback,
                };
                match connection.pending_acks.insert(pending) {
                    Ok(()) => debug!("{handle} waiting for acknowledgment of packet {packet_id}"),
                    Err(mut rejected) => {
                        error!("{handle} packet {packet_id} is already awaiting acknowledgment");
                        if let Some(rollback) = rejected.rollback.take() {
                            connection.subscriptions.undo(rollback);
                        }
                        rejected.complete(Err(Error::IllegalState));
                    }
                }
                return ControlFlow::Continue(());
            }
            Ok(Ack::None) => Ok(()),
            Err(error) => Err(error),
        };

        let fatal = match result {
            Err(error) if error.is_fatal() && is_session_command(kind) => Some(error),
            Err(error) => {
                warn!("{kind:?} on {handle} failed: {error}");
                None
            }
            Ok(()) => None,
        };

        // One re-armed poll per connection, however many were submitted.
        if let (Some(timeout_ms), None) = (rearm, fatal) {
            if connection.poll_armed {
                debug!("{handle} already has a PROCESS_LOOP queued");
            } else {
                match self.queue.requeue(Command::rearm(handle, timeout_ms)) {
                    Ok(()) => connection.poll_armed = true,
                    Err(error) => {
                        warn!("{handle} polling stopped, PROCESS_LOOP not re-armed: {error}")
                    }
                }
            }
        }

        complete(on_complete, result);

        match fatal {
            Some(error) => {
                error!("{kind:?} on {handle} failed fatally: {error}");
                ControlFlow::Break(Some(handle))
            }
            None => ControlFlow::Continue(()),
        }
    }

    /// Topic filters registered on `handle`, in routing order.
    pub fn subscriptions(&self, handle: ConnectionHandle) -> impl Iterator<Item = &str> {
        self.connections
            .slot(handle)
            .into_iter()
            .flat_map(|connection| connection.subscriptions.iter())
            .map(|subscription| subscription.topic_filter.as_str())
    }

    /// Number of commands on `handle` waiting for an acknowledgment.
    pub fn pending_acks(&self, handle: ConnectionHandle) -> usize {
        self.connections
            .slot(handle)
            .map_or(0, |connection| connection.pending_acks.len())
    }

    /// The session-present flag from the last successful connect of `handle`.
    pub fn session_present(&self, handle: ConnectionHandle) -> bool {
        self.connections
            .slot(handle)
            .is_some_and(|connection| connection.session_present())
    }

    /// Number of commands waiting in the queue.
    pub fn num_waiting(&self) -> usize {
        self.queue.len()
    }
}

/// Commands whose transport failure means the session is gone.
fn is_session_command(kind: CommandKind) -> bool {
    matches!(
        kind,
        CommandKind::Subscribe
            | CommandKind::Unsubscribe
            | CommandKind::Publish
            | CommandKind::ProcessLoop
            | CommandKind::Ping
    )
}
