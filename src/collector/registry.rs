//! Field registry: the target shape paired with live channels.
//!
//! Built once per collector from [`Record::fields`] and immutable
//! afterwards. Routing for emissions is a by-name lookup; the channels are
//! released exactly once at cancellation.

use std::sync::Arc;

use crate::collector::CollectError;
use crate::collector::channel::FieldChannel;
use crate::schema::{FieldSpec, Record};

/// One declared field paired with its channel.
pub(crate) struct FieldSlot {
    pub(crate) spec: FieldSpec,
    pub(crate) channel: Arc<FieldChannel>,
}

/// Ordered field table of a target shape, one fresh channel per field.
pub(crate) struct FieldRegistry {
    slots: Vec<FieldSlot>,
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRegistry")
            .field(
                "fields",
                &self.slots.iter().map(|slot| slot.spec).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl FieldRegistry {
    /// Derive the registry from the target shape's descriptor table.
    pub(crate) fn discover<R: Record>() -> Result<Self, CollectError> {
        let fields = R::fields();
        if fields.is_empty() {
            return Err(CollectError::Configuration(format!(
                "target shape {} declares no fields",
                std::any::type_name::<R>()
            )));
        }
        for (i, spec) in fields.iter().enumerate() {
            if fields[..i].iter().any(|other| other.name() == spec.name()) {
                return Err(CollectError::Configuration(format!(
                    "target shape {} declares field '{}' more than once",
                    std::any::type_name::<R>(),
                    spec.name()
                )));
            }
        }

        let slots = fields
            .iter()
            .map(|spec| FieldSlot {
                spec: *spec,
                channel: Arc::new(FieldChannel::new()),
            })
            .collect();
        Ok(Self { slots })
    }

    /// Registry with no fields, for handles that failed construction.
    pub(crate) fn empty() -> Self {
        Self { slots: Vec::new() }
    }

    /// Slot for `field`, if the shape declares it.
    pub(crate) fn get(&self, field: &str) -> Option<&FieldSlot> {
        self.slots.iter().find(|slot| slot.spec.name() == field)
    }

    pub(crate) fn slots(&self) -> &[FieldSlot] {
        &self.slots
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Close every channel, dropping buffered values. Idempotent.
    pub(crate) fn close_all(&self) {
        for slot in &self.slots {
            slot.channel.close();
        }
    }
}
