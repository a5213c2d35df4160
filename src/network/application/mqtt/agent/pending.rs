//! Per-connection table of commands waiting for their acknowledgment.

use heapless::Vec;
use log::{debug, warn};

use super::PENDING_ACKS_MAX_SIZE;
use super::command::{CommandCallback, CommandKind};
use super::subscriptions::{Rollback, SubscriptionRegistry};
use crate::network::application::mqtt::engine::AckKind;
use crate::network::application::mqtt::{Error, PublishInfo};

pub(crate) struct PendingAck {
    pub(crate) packet_id: u16,
    pub(crate) kind: CommandKind,
    pub(crate) on_complete: Option<CommandCallback>,
    /// Copy of an in-flight publish, kept for resending on session resume.
    pub(crate) publish: Option<PublishInfo>,
    /// Registry changes of a SUBSCRIBE, undone if the broker refuses it.
    pub(crate) rollback: Option<Rollback>,
}

impl PendingAck {
    fn completed_by(&self, ack: AckKind) -> bool {
        matches!(
            (self.kind, ack),
            (CommandKind::Subscribe, AckKind::Suback)
                | (CommandKind::Unsubscribe, AckKind::Unsuback)
                | (
                    CommandKind::Publish,
                    AckKind::Puback | AckKind::Pubrec | AckKind::Pubcomp
                )
        )
    }

    pub(crate) fn complete(self, result: Result<(), Error>) {
        if let Some(callback) = self.on_complete {
            callback(result);
        }
    }
}

/// Fixed-capacity map from packet identifier to the waiting command.
/// Packet identifiers are unique among live entries.
#[derive(Default)]
pub(crate) struct PendingAckTable {
    entries: Vec<PendingAck, PENDING_ACKS_MAX_SIZE>,
}

impl PendingAckTable {
    pub(crate) fn has_room(&self) -> bool {
        !self.entries.is_full()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Track `ack`. Hands it back if its packet identifier is already live or
    /// the table is full.
    pub(crate) fn insert(&mut self, ack: PendingAck) -> Result<(), PendingAck> {
        if self.entries.iter().any(|entry| entry.packet_id == ack.packet_id) {
            return Err(ack);
        }
        self.entries.push(ack)
    }

    /// Match an inbound acknowledgment and fire the waiting command's callback.
    ///
    /// A successful PUBREC is only the first half of a QoS 2 exchange, so the
    /// entry stays until PUBCOMP. A refused SUBACK takes the command's
    /// filters back out of `subscriptions`. Acknowledgments with no live
    /// entry are duplicates or stale redeliveries and are ignored.
    pub(crate) fn acknowledge(
        &mut self,
        ack: AckKind,
        packet_id: u16,
        result: Result<(), Error>,
        subscriptions: &mut SubscriptionRegistry,
    ) {
        let Some(index) = self
            .entries
            .iter()
            .position(|entry| entry.packet_id == packet_id)
        else {
            debug!("ignoring {ack:?} for packet {packet_id} with no pending command");
            return;
        };

        if !self.entries[index].completed_by(ack) {
            warn!(
                "{ack:?} for packet {packet_id} does not answer a pending {:?}",
                self.entries[index].kind
            );
            return;
        }

        if ack == AckKind::Pubrec && result.is_ok() {
            debug!("packet {packet_id} received, waiting for PUBCOMP");
            return;
        }

        let mut entry = self.entries.remove(index);
        if let (Err(error), Some(rollback)) = (result, entry.rollback.take()) {
            warn!("subscribe {packet_id} failed ({error}), removing its filters");
            subscriptions.undo(rollback);
        }
        entry.complete(result);
    }

    /// In-flight publishes with their packet identifiers, oldest first.
    pub(crate) fn inflight_publishes(&self) -> impl Iterator<Item = (u16, &PublishInfo)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.publish.as_ref().map(|publish| (entry.packet_id, publish)))
    }

    /// Drop every entry. With `notify` each waiting command completes with
    /// [`Error::Canceled`]; otherwise callbacks are discarded unrun.
    pub(crate) fn abandon(&mut self, notify: bool) {
        let abandoned = core::mem::take(&mut self.entries);
        if !abandoned.is_empty() {
            debug!("abandoning {} pending acknowledgments", abandoned.len());
        }
        for entry in abandoned {
            if notify {
                entry.complete(Err(Error::Canceled));
            }
        }
    }
}
