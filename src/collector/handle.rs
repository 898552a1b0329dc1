//! Live collector handle.
//!
//! [`Collector`] is the caller-facing surface of a running pipeline:
//! `emit` routes values into field channels, `cancel` tears the pipeline
//! down. The handle is `Sync`; share it behind an `Arc` to emit from many
//! tasks.

use std::any::{Any, TypeId};
use std::sync::{Arc, Mutex};

use strum_macros::{AsRefStr, Display};
use tokio::task::JoinHandle;

use crate::collector::CollectError;
use crate::collector::builder::{CollectorBuilder, Mode};
use crate::collector::worker::Shared;
use crate::schema::Record;

/// Lifecycle state of a collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum CollectorState {
    /// Accepting emissions and assembling instances.
    Active,
    /// Terminal: channels released, background task stopped.
    Cancelled,
}

/// Handle to a running collection pipeline.
///
/// Created by [`CollectorBuilder::spawn`] or [`Collector::single_use`].
/// Dropping the handle cancels the pipeline.
pub struct Collector {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
    mode: Mode,
}

impl Collector {
    /// Builder for a collector over target shape `R`.
    pub fn builder<R: Record>() -> CollectorBuilder<R> {
        CollectorBuilder::new()
    }

    /// Collector that delivers exactly one result (success or failure)
    /// and then cancels itself.
    pub fn single_use<R, F>(on_result: F) -> Self
    where
        R: Record,
        F: FnMut(Result<R, CollectError>) + Send + 'static,
    {
        CollectorBuilder::new().collection_limit(1).spawn(on_result)
    }

    pub(crate) fn started(shared: Arc<Shared>, task: JoinHandle<()>, mode: Mode) -> Self {
        Self {
            shared,
            task: Mutex::new(Some(task)),
            mode,
        }
    }

    pub(crate) fn cancelled(mode: Mode) -> Self {
        Self {
            shared: Arc::new(Shared::new_cancelled()),
            task: Mutex::new(None),
            mode,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> CollectorState {
        if self.shared.is_cancelled() {
            CollectorState::Cancelled
        } else {
            CollectorState::Active
        }
    }

    /// Whether the collector has reached its terminal state.
    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// Engine variant this collector runs with.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Route `value` into `field`'s channel.
    ///
    /// Fire-and-forget: returns as soon as the value is buffered, without
    /// waiting for assembly. The newest value for a field overwrites an
    /// unconsumed older one. In [`Mode::Strict`] the value's runtime type
    /// is checked against the field's declared type here; a mismatch (or
    /// an unknown field name, in either mode) fails the whole collector
    /// and the error is also delivered through the result callback.
    ///
    /// # Errors
    ///
    /// [`CollectError::Cancelled`] after cancellation (the value is
    /// dropped), [`CollectError::UnknownField`] or
    /// [`CollectError::TypeMismatch`] on fail-fast rejection.
    pub fn emit<T: Any + Send>(&self, field: &str, value: T) -> Result<(), CollectError> {
        if self.shared.is_cancelled() {
            return Err(CollectError::Cancelled);
        }

        let registry = self.shared.registry();
        let Some(slot) = registry.get(field) else {
            let error = CollectError::UnknownField {
                field: field.to_string(),
            };
            if self.shared.fail(error.clone()) {
                tracing::warn!(field, "emission to unknown field; collector failed");
            }
            return Err(error);
        };

        if self.mode == Mode::Strict && !slot.spec.accepts_id(TypeId::of::<T>()) {
            let error = CollectError::TypeMismatch {
                field: field.to_string(),
                expected: slot.spec.type_name(),
                actual: std::any::type_name::<T>(),
            };
            if self.shared.fail(error.clone()) {
                tracing::warn!(field, error = %error, "emission rejected; collector failed");
            }
            return Err(error);
        }

        if slot.channel.publish(Box::new(value)) {
            Ok(())
        } else {
            // Raced a cancellation; the emission is dropped.
            Err(CollectError::Cancelled)
        }
    }

    /// Cancel the pipeline: stop the background task, release every field
    /// channel, and drop buffered values.
    ///
    /// Idempotent; also invoked by the collection-limit policy, on any
    /// failure, and on drop. No result callbacks fire after an explicit
    /// cancellation begins.
    pub fn cancel(&self) {
        if self.shared.cancel() {
            tracing::debug!("collector cancelled");
        }
        if let Some(task) = self.lock_task().take() {
            task.abort();
        }
    }

    fn lock_task(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Collector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collector")
            .field("state", &self.state())
            .field("mode", &self.mode)
            .field("fields", &self.shared.registry().len())
            .finish_non_exhaustive()
    }
}

impl Drop for Collector {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    crate::record! {
        #[derive(Debug)]
        struct One {
            n: u32,
        }
    }

    #[test]
    fn test_collector_state_strings() {
        assert_eq!(CollectorState::Active.to_string(), "active");
        assert_eq!(CollectorState::Cancelled.as_ref(), "cancelled");
    }

    #[tokio::test]
    async fn test_debug_reports_state_and_shape() {
        let collector = Collector::builder::<One>().spawn(|_| {});
        let rendered = format!("{collector:?}");
        assert!(rendered.contains("Collector"));
        assert!(rendered.contains("Active"));
        assert!(rendered.contains("fields: 1"));
        collector.cancel();
    }

    #[tokio::test]
    async fn test_cancelled_handle_rejects_emissions() {
        let collector = Collector::builder::<One>().spawn(|_| {});
        collector.cancel();
        assert_eq!(collector.state(), CollectorState::Cancelled);
        assert!(matches!(
            collector.emit("n", 1_u32),
            Err(CollectError::Cancelled)
        ));
    }
}
