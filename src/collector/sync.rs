//! Snapshot synchronization.
//!
//! Joins the registry's channels into a sequence of complete snapshots:
//! each round waits for one new value from every field, then captures the
//! most recent value per field. Values are tagged with their field name as
//! they are collected, so a snapshot is a flat name → value set and the
//! join is commutative in field order.

use std::sync::Arc;

use crate::collector::registry::FieldRegistry;
use crate::schema::Snapshot;

pub(crate) struct Synchronizer {
    registry: Arc<FieldRegistry>,
}

impl Synchronizer {
    pub(crate) fn new(registry: Arc<FieldRegistry>) -> Self {
        Self { registry }
    }

    /// Await the next complete snapshot.
    ///
    /// Resolves once every field has published at least once since the
    /// previous snapshot; a field that publishes repeatedly while the
    /// round is still waiting contributes only its most recent value.
    /// Returns `None` once the channels are closed.
    pub(crate) async fn next(&self) -> Option<Snapshot> {
        let slots = self.registry.slots();
        let mut entries = Vec::with_capacity(slots.len());
        for slot in slots {
            let value = slot.channel.recv().await?;
            entries.push((slot.spec.name(), value));
        }

        // A field may have republished while the round was blocked on
        // another; the snapshot takes whatever is most recent.
        for (entry, slot) in entries.iter_mut().zip(slots) {
            if let Some(newer) = slot.channel.try_recv() {
                entry.1 = newer;
            }
        }

        Some(Snapshot::new(entries))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Record;

    crate::record! {
        #[derive(Debug, PartialEq)]
        struct Pair {
            a: u32,
            b: u32,
        }
    }

    fn registry() -> Arc<FieldRegistry> {
        Arc::new(FieldRegistry::discover::<Pair>().unwrap())
    }

    fn publish(registry: &FieldRegistry, field: &str, value: u32) {
        assert!(registry.get(field).unwrap().channel.publish(Box::new(value)));
    }

    #[tokio::test]
    async fn test_next_waits_for_all_fields() {
        let registry = registry();
        let synchronizer = Synchronizer::new(Arc::clone(&registry));
        publish(&registry, "b", 2);
        publish(&registry, "a", 1);

        let mut snapshot = synchronizer.next().await.unwrap();
        let pair = Pair::assemble(&mut snapshot).unwrap();
        assert_eq!(pair, Pair { a: 1, b: 2 });
    }

    #[tokio::test]
    async fn test_republished_value_replaces_within_round() {
        let registry = registry();
        let synchronizer = Synchronizer::new(Arc::clone(&registry));
        publish(&registry, "a", 1);

        let round = tokio::spawn(async move { synchronizer.next().await });
        // Let the round consume `a` and park on `b`.
        tokio::task::yield_now().await;
        publish(&registry, "a", 3);
        publish(&registry, "b", 2);

        let mut snapshot = round.await.unwrap().unwrap();
        let pair = Pair::assemble(&mut snapshot).unwrap();
        assert_eq!(pair, Pair { a: 3, b: 2 });
    }

    #[tokio::test]
    async fn test_closed_channels_end_the_sequence() {
        let registry = registry();
        let synchronizer = Synchronizer::new(Arc::clone(&registry));
        publish(&registry, "a", 1);
        registry.close_all();
        assert!(synchronizer.next().await.is_none());
    }
}
