//! Connection slots and the fixed-size connection table.

use log::{debug, info};

use super::MAX_CONNECTIONS;
use super::command::{CommandKind, ConnectionHandle, PublishCallback, SubscribeList};
use super::pending::PendingAckTable;
use super::subscriptions::{Rollback, SubscriptionRegistry};
use crate::network::application::mqtt::clock::{self, GetCurrentTimeMs};
use crate::network::application::mqtt::engine::{IncomingEvent, ProtocolEngine};
use crate::network::application::mqtt::{ConnectInfo, Error, PublishInfo, SubscribeInfo};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotState {
    /// No engine bound; the slot can be initialized.
    Empty,
    /// Bound and accepting commands.
    Active,
    /// Disconnected; only FREE or a new connect is accepted.
    Disconnected,
}

/// What a command expects after its packet went out.
pub(crate) enum Ack {
    /// Nothing; the command is complete.
    None,
    /// An acknowledgment for `packet_id`.
    Expected {
        packet_id: u16,
        kind: CommandKind,
        publish: Option<PublishInfo>,
        rollback: Option<Rollback>,
    },
}

/// One slot of the connection table: a protocol engine plus everything the
/// agent tracks for its session.
pub(crate) struct Connection<E> {
    engine: Option<E>,
    clock: GetCurrentTimeMs,
    state: SlotState,
    session_present: bool,
    pub(crate) subscriptions: SubscriptionRegistry,
    pub(crate) pending_acks: PendingAckTable,
    unknown_publish: Option<PublishCallback>,
    /// A re-armed PROCESS_LOOP for this slot is waiting in the queue.
    pub(crate) poll_armed: bool,
}

impl<E> Default for Connection<E> {
    fn default() -> Self {
        Self {
            engine: None,
            clock: clock::monotonic_ms,
            state: SlotState::Empty,
            session_present: false,
            subscriptions: SubscriptionRegistry::default(),
            pending_acks: PendingAckTable::default(),
            unknown_publish: None,
            poll_armed: false,
        }
    }
}

impl<E: ProtocolEngine> Connection<E> {
    pub(crate) fn is_bound(&self) -> bool {
        self.state != SlotState::Empty
    }

    pub(crate) fn is_active(&self) -> bool {
        self.state == SlotState::Active
    }

    pub(crate) fn session_present(&self) -> bool {
        self.session_present
    }

    fn engine(&mut self) -> Result<&mut E, Error> {
        self.engine.as_mut().ok_or(Error::IllegalState)
    }

    pub(crate) fn bind(
        &mut self,
        transport: E::Transport,
        clock: GetCurrentTimeMs,
        unknown_publish: PublishCallback,
    ) -> Result<(), Error> {
        if self.is_bound() {
            return Err(Error::IllegalState);
        }
        self.engine = Some(E::bind(transport, clock)?);
        self.clock = clock;
        self.unknown_publish = Some(unknown_publish);
        self.session_present = false;
        self.state = SlotState::Active;
        Ok(())
    }

    pub(crate) fn connect(
        &mut self,
        info: &ConnectInfo<'_>,
        will: Option<&PublishInfo>,
        timeout_ms: u32,
    ) -> Result<bool, Error> {
        let started = (self.clock)();
        let session_present = self.engine()?.connect(info, will, timeout_ms)?;
        info!(
            "client {} connected in {} ms, session present: {}",
            info.client_id,
            clock::elapsed_ms(started, (self.clock)()),
            session_present
        );
        self.session_present = session_present;
        self.state = SlotState::Active;
        Ok(session_present)
    }

    /// Recover after a reconnect: resend in-flight publishes if the broker kept
    /// the session, otherwise abandon them and subscribe again to every filter.
    pub(crate) fn resume(&mut self, session_present: bool, notify_abandoned: bool) -> Result<(), Error> {
        let Self {
            engine,
            subscriptions,
            pending_acks,
            ..
        } = self;
        let engine = engine.as_mut().ok_or(Error::IllegalState)?;

        if session_present {
            for (packet_id, publish) in pending_acks.inflight_publishes() {
                let mut duplicate = publish.clone();
                duplicate.dup = true;
                debug!("resending publish {packet_id} on {}", duplicate.topic);
                engine.republish(&duplicate, packet_id)?;
            }
            return Ok(());
        }

        pending_acks.abandon(notify_abandoned);
        if subscriptions.is_empty() {
            return Ok(());
        }

        let mut resubscribe = SubscribeList::new();
        for entry in subscriptions.iter() {
            let info = SubscribeInfo {
                qos: entry.qos,
                topic_filter: entry.topic_filter.clone(),
            };
            resubscribe.push(info).map_err(|_| Error::NoMemory)?;
        }
        let packet_id = engine.subscribe(&resubscribe)?;
        debug!(
            "resubscribed {} filters with packet {packet_id}",
            resubscribe.len()
        );
        Ok(())
    }

    pub(crate) fn subscribe(
        &mut self,
        subscriptions: &SubscribeList,
        on_publish: &PublishCallback,
    ) -> Result<Ack, Error> {
        if subscriptions.is_empty() {
            return Err(Error::BadParameter);
        }
        if !self.pending_acks.has_room() {
            return Err(Error::PendingAcksFull);
        }

        let rollback = self.subscriptions.insert_all(subscriptions, on_publish)?;
        let sent = self
            .engine()
            .and_then(|engine| engine.subscribe(subscriptions));
        match sent {
            Ok(packet_id) => {
                debug!("{} filters registered", self.subscriptions.len());
                Ok(Ack::Expected {
                    packet_id,
                    kind: CommandKind::Subscribe,
                    publish: None,
                    rollback: Some(rollback),
                })
            }
            Err(error) => {
                self.subscriptions.undo(rollback);
                Err(error)
            }
        }
    }

    pub(crate) fn unsubscribe(&mut self, subscriptions: &SubscribeList) -> Result<Ack, Error> {
        if subscriptions.is_empty() {
            return Err(Error::BadParameter);
        }
        if !self.pending_acks.has_room() {
            return Err(Error::PendingAcksFull);
        }

        let previous = self.subscriptions.clone();
        let removed = self.subscriptions.remove_all(subscriptions);
        debug!("removed {removed} of {} filters", subscriptions.len());
        let sent = self
            .engine()
            .and_then(|engine| engine.unsubscribe(subscriptions));
        match sent {
            Ok(packet_id) => Ok(Ack::Expected {
                packet_id,
                kind: CommandKind::Unsubscribe,
                publish: None,
                rollback: None,
            }),
            Err(error) => {
                self.subscriptions = previous;
                Err(error)
            }
        }
    }

    pub(crate) fn publish(&mut self, publish: PublishInfo) -> Result<Ack, Error> {
        let expects_ack = publish.qos.expects_ack();
        if expects_ack && !self.pending_acks.has_room() {
            return Err(Error::PendingAcksFull);
        }

        match (expects_ack, self.engine()?.publish(&publish)?) {
            (false, _) => Ok(Ack::None),
            (true, Some(packet_id)) => Ok(Ack::Expected {
                packet_id,
                kind: CommandKind::Publish,
                publish: Some(publish),
                rollback: None,
            }),
            (true, None) => Err(Error::IllegalState),
        }
    }

    /// Run one engine iteration, routing inbound publishes to subscriptions
    /// (or the unknown-publish callback) and matching acknowledgments.
    pub(crate) fn process_loop(&mut self, timeout_ms: u32) -> Result<(), Error> {
        let Self {
            engine,
            subscriptions,
            pending_acks,
            unknown_publish,
            ..
        } = self;
        let engine = engine.as_mut().ok_or(Error::IllegalState)?;

        engine.process_loop(timeout_ms, &mut |event| match event {
            IncomingEvent::Publish(publish) => {
                if subscriptions.route(publish) {
                    return;
                }
                match unknown_publish {
                    Some(callback) => callback(publish),
                    None => debug!("dropping unsolicited publish on {}", publish.topic),
                }
            }
            IncomingEvent::Ack {
                kind,
                packet_id,
                result,
            } => pending_acks.acknowledge(kind, packet_id, result, subscriptions),
        })
    }

    pub(crate) fn ping(&mut self) -> Result<(), Error> {
        self.engine()?.ping()
    }

    /// Send DISCONNECT and stop accepting commands. Outstanding
    /// acknowledgments are abandoned whether or not the send succeeded.
    pub(crate) fn disconnect(&mut self, notify_abandoned: bool) -> Result<(), Error> {
        let result = self.engine()?.disconnect();
        self.state = SlotState::Disconnected;
        self.pending_acks.abandon(notify_abandoned);
        result
    }

    /// Release the engine and reset the slot so it can be initialized again.
    pub(crate) fn release(&mut self, notify_abandoned: bool) -> Result<(), Error> {
        self.pending_acks.abandon(notify_abandoned);
        self.subscriptions.clear();
        self.unknown_publish = None;
        self.session_present = false;
        self.state = SlotState::Empty;
        match self.engine.take() {
            Some(engine) => engine.release(),
            None => Ok(()),
        }
    }
}

/// Fixed-size arena of connection slots indexed by [`ConnectionHandle`].
pub(crate) struct ConnectionTable<E> {
    slots: [Connection<E>; MAX_CONNECTIONS],
}

impl<E: ProtocolEngine> ConnectionTable<E> {
    pub(crate) fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| Connection::default()),
        }
    }

    /// The slot for `handle`, if the handle is in range.
    pub(crate) fn slot(&self, handle: ConnectionHandle) -> Option<&Connection<E>> {
        self.slots.get(handle.0)
    }

    pub(crate) fn slot_mut(&mut self, handle: ConnectionHandle) -> Option<&mut Connection<E>> {
        self.slots.get_mut(handle.0)
    }

    /// The slot for `handle` if it is in range and active.
    pub(crate) fn active_mut(&mut self, handle: ConnectionHandle) -> Result<&mut Connection<E>, Error> {
        self.slot_mut(handle)
            .filter(|connection| connection.is_active())
            .ok_or(Error::NotFound)
    }
}
