//! Per-connection subscription registry and inbound publish routing.

use heapless::{String, Vec};
use log::debug;

use super::SUBSCRIPTIONS_MAX_COUNT;
use super::command::PublishCallback;
use crate::network::application::mqtt::{
    topic, Error, PublishInfo, QoS, SubscribeInfo, SUBSCRIPTION_BUFFER_SIZE,
};

#[derive(Clone)]
pub(crate) struct Subscription {
    pub(crate) topic_filter: String<SUBSCRIPTION_BUFFER_SIZE>,
    pub(crate) qos: QoS,
    on_publish: PublishCallback,
}

/// What a SUBSCRIBE changed in the registry, so a refused SUBACK can undo it.
///
/// One record per requested filter, in request order: the entry the filter
/// replaced, or `None` if it was added.
#[derive(Default)]
pub(crate) struct Rollback {
    changes: Vec<(String<SUBSCRIPTION_BUFFER_SIZE>, Option<Subscription>), SUBSCRIPTIONS_MAX_COUNT>,
}

/// Fixed-capacity map from topic filter to delivery callback.
///
/// Entries keep insertion order, which is also the order callbacks run in
/// when several filters match one publish. A filter appears at most once.
#[derive(Clone, Default)]
pub(crate) struct SubscriptionRegistry {
    entries: Vec<Subscription, SUBSCRIPTIONS_MAX_COUNT>,
}

impl SubscriptionRegistry {
    /// Add every filter of `subscriptions`, all delivering to `on_publish`.
    ///
    /// A filter that is already registered keeps its position and takes the
    /// new callback and QoS. Either every filter is added or, when the
    /// registry would overflow, none is and `SubscriptionsFull` is returned.
    pub(crate) fn insert_all(
        &mut self,
        subscriptions: &[SubscribeInfo],
        on_publish: &PublishCallback,
    ) -> Result<Rollback, Error> {
        let mut staged = self.entries.clone();
        let mut rollback = Rollback::default();
        for subscription in subscriptions {
            let existing = staged
                .iter_mut()
                .find(|entry| entry.topic_filter == subscription.topic_filter);
            let replaced = match existing {
                Some(entry) => {
                    let previous = entry.clone();
                    entry.qos = subscription.qos;
                    entry.on_publish = on_publish.clone();
                    Some(previous)
                }
                None => {
                    staged
                        .push(Subscription {
                            topic_filter: subscription.topic_filter.clone(),
                            qos: subscription.qos,
                            on_publish: on_publish.clone(),
                        })
                        .map_err(|_| Error::SubscriptionsFull)?;
                    None
                }
            };
            rollback
                .changes
                .push((subscription.topic_filter.clone(), replaced))
                .map_err(|_| Error::SubscriptionsFull)?;
        }
        self.entries = staged;
        Ok(rollback)
    }

    /// Revert a SUBSCRIBE the broker refused. Added filters are removed and
    /// replaced entries get their previous callback back. Filters that were
    /// unsubscribed in the meantime stay gone.
    pub(crate) fn undo(&mut self, mut rollback: Rollback) {
        while let Some((topic_filter, previous)) = rollback.changes.pop() {
            let position = self
                .entries
                .iter()
                .position(|entry| entry.topic_filter == topic_filter);
            match (position, previous) {
                (Some(index), Some(previous)) => self.entries[index] = previous,
                (Some(index), None) => {
                    self.entries.remove(index);
                }
                (None, _) => {}
            }
        }
    }

    /// Remove every entry whose filter is identical to one in `subscriptions`.
    /// Returns how many entries were removed.
    pub(crate) fn remove_all(&mut self, subscriptions: &[SubscribeInfo]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| {
            !subscriptions
                .iter()
                .any(|subscription| subscription.topic_filter == entry.topic_filter)
        });
        before - self.entries.len()
    }

    /// Hand `publish` to every subscription whose filter matches its topic,
    /// in registry order. Returns `false` if nothing matched.
    pub(crate) fn route(&self, publish: &PublishInfo) -> bool {
        let mut delivered = false;
        for entry in self
            .entries
            .iter()
            .filter(|entry| topic::matches(&entry.topic_filter, &publish.topic))
        {
            debug!("delivering {} to filter {}", publish.topic, entry.topic_filter);
            (entry.on_publish)(publish);
            delivered = true;
        }
        delivered
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Subscription> {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }
}
