//! Commands carried by the queue from caller threads to the agent.

use core::fmt;
use std::sync::Arc;

use heapless::Vec;

use super::SUBSCRIPTIONS_MAX_COUNT;
use crate::network::application::mqtt::{Error, PublishInfo, SubscribeInfo};

/// Completion callback of a command, invoked exactly once on the agent thread.
///
/// Anything the caller needs back (a channel, a counter, a flag) is captured
/// by the closure and stays alive until the call.
pub type CommandCallback = Box<dyn FnOnce(Result<(), Error>) + Send + 'static>;

/// Delivery callback of a subscription, invoked on the agent thread for every
/// matching inbound publish.
pub type PublishCallback = Arc<dyn Fn(&PublishInfo) + Send + Sync + 'static>;

/// The topic filters of one SUBSCRIBE or UNSUBSCRIBE command.
pub type SubscribeList = Vec<SubscribeInfo, SUBSCRIPTIONS_MAX_COUNT>;

/// Index of a connection slot, in `0..MAX_CONNECTIONS`.
///
/// Handles are plain indices: the agent validates them when a command is
/// dispatched, and a handle must not be used after a FREE for it completed
/// unless the slot was initialized again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionHandle(pub usize);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection {}", self.0)
    }
}

/// Kind tag of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKind {
    /// Subscribe to topic filters.
    Subscribe,
    /// Unsubscribe from topic filters.
    Unsubscribe,
    /// Publish a message.
    Publish,
    /// Run one receive iteration of the protocol engine.
    ProcessLoop,
    /// Send a keep-alive.
    Ping,
    /// Disconnect from the broker.
    Disconnect,
    /// Release a connection slot.
    Free,
    /// Stop the command loop.
    Terminate,
}

pub(crate) enum Request {
    Subscribe {
        subscriptions: SubscribeList,
        on_publish: PublishCallback,
    },
    Unsubscribe {
        subscriptions: SubscribeList,
    },
    Publish(PublishInfo),
    ProcessLoop {
        timeout_ms: u32,
        /// Queued by the agent itself after the previous iteration.
        rearmed: bool,
    },
    Ping,
    Disconnect,
    Free,
    Terminate,
}

impl Request {
    pub(crate) fn kind(&self) -> CommandKind {
        match self {
            Request::Subscribe { .. } => CommandKind::Subscribe,
            Request::Unsubscribe { .. } => CommandKind::Unsubscribe,
            Request::Publish(_) => CommandKind::Publish,
            Request::ProcessLoop { .. } => CommandKind::ProcessLoop,
            Request::Ping => CommandKind::Ping,
            Request::Disconnect => CommandKind::Disconnect,
            Request::Free => CommandKind::Free,
            Request::Terminate => CommandKind::Terminate,
        }
    }
}

/// A unit of work for the agent. Immutable once built.
///
/// Commands are usually created by the [`AgentHandle`](super::AgentHandle)
/// helpers; build one directly to submit it with
/// [`AgentHandle::submit`](super::AgentHandle::submit).
pub struct Command {
    pub(crate) handle: ConnectionHandle,
    pub(crate) request: Request,
    pub(crate) on_complete: Option<CommandCallback>,
}

impl Command {
    fn new(handle: ConnectionHandle, request: Request) -> Self {
        Self {
            handle,
            request,
            on_complete: None,
        }
    }

    /// SUBSCRIBE to `subscriptions`, delivering matching publishes to `on_publish`.
    pub fn subscribe(
        handle: ConnectionHandle,
        subscriptions: SubscribeList,
        on_publish: PublishCallback,
    ) -> Self {
        Self::new(
            handle,
            Request::Subscribe {
                subscriptions,
                on_publish,
            },
        )
    }

    /// UNSUBSCRIBE from `subscriptions`.
    pub fn unsubscribe(handle: ConnectionHandle, subscriptions: SubscribeList) -> Self {
        Self::new(handle, Request::Unsubscribe { subscriptions })
    }

    /// PUBLISH `publish`.
    pub fn publish(handle: ConnectionHandle, publish: PublishInfo) -> Self {
        Self::new(handle, Request::Publish(publish))
    }

    /// Run one engine receive iteration; the agent re-arms it after it ran.
    pub fn process_loop(handle: ConnectionHandle, timeout_ms: u32) -> Self {
        Self::new(
            handle,
            Request::ProcessLoop {
                timeout_ms,
                rearmed: false,
            },
        )
    }

    pub(crate) fn rearm(handle: ConnectionHandle, timeout_ms: u32) -> Self {
        Self::new(
            handle,
            Request::ProcessLoop {
                timeout_ms,
                rearmed: true,
            },
        )
    }

    /// Send a keep-alive.
    pub fn ping(handle: ConnectionHandle) -> Self {
        Self::new(handle, Request::Ping)
    }

    /// Disconnect from the broker.
    pub fn disconnect(handle: ConnectionHandle) -> Self {
        Self::new(handle, Request::Disconnect)
    }

    /// Release the connection slot.
    pub fn free(handle: ConnectionHandle) -> Self {
        Self::new(handle, Request::Free)
    }

    /// Stop the command loop. Not tied to any connection.
    pub fn terminate() -> Self {
        Self::new(ConnectionHandle(0), Request::Terminate)
    }

    /// Attach the completion callback.
    pub fn on_complete<F>(mut self, on_complete: F) -> Self
    where
        F: FnOnce(Result<(), Error>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(on_complete));
        self
    }

    /// The kind tag of this command.
    pub fn kind(&self) -> CommandKind {
        self.request.kind()
    }

    /// The connection this command targets.
    pub fn connection(&self) -> ConnectionHandle {
        self.handle
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("kind", &self.kind())
            .field("handle", &self.handle)
            .field("has_callback", &self.on_complete.is_some())
            .finish()
    }
}

pub(crate) fn complete(on_complete: Option<CommandCallback>, result: Result<(), Error>) {
    if let Some(callback) = on_complete {
        callback(result);
    }
}
