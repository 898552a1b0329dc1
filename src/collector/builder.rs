//! Collector construction.
//!
//! [`CollectorBuilder`] configures a collector and starts its pipeline.
//! [`CollectorOptions`] is the serializable subset of those knobs, so hosts
//! can declare collectors in their configuration files; [`Mode`] selects
//! the engine variant.

use std::marker::PhantomData;
use std::num::NonZeroU64;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use tokio::runtime::Handle;

use crate::collector::registry::FieldRegistry;
use crate::collector::worker::{self, ResultCallback, Shared};
use crate::collector::{CollectError, Collector};
use crate::schema::Record;

/// Engine variant: when emitted values are checked against declared types.
///
/// The two variants deliberately coexist rather than being merged.
/// [`Mode::Strict`] is the recommended configuration for sequential,
/// single-use workflows.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mode {
    /// Validate each emission against the field's declared type; a
    /// mismatch fails the whole collector at the emit call.
    #[default]
    Strict,
    /// Accept any emission; a mismatched value surfaces at assembly time
    /// as a construction error.
    Relaxed,
}

/// Serializable collector options.
///
/// Mirrors the builder's knobs so collectors can be declared in host
/// configuration files and applied with [`CollectorBuilder::options`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorOptions {
    /// Engine variant (default: strict).
    #[serde(default)]
    pub mode: Mode,
    /// Maximum number of instances to assemble before self-cancelling
    /// (default: unbounded).
    #[serde(default)]
    pub collection_limit: Option<u64>,
}

/// Builder for a [`Collector`] over target shape `R`.
pub struct CollectorBuilder<R: Record> {
    mode: Mode,
    limit: Option<NonZeroU64>,
    runtime: Option<Handle>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> CollectorBuilder<R> {
    /// Builder with default options: strict mode, unbounded collection,
    /// background task on the current tokio runtime.
    pub fn new() -> Self {
        Self {
            mode: Mode::default(),
            limit: None,
            runtime: None,
            _record: PhantomData,
        }
    }

    /// Select the engine variant.
    pub fn mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Cancel automatically once `limit` instances have been assembled.
    ///
    /// A limit of zero is treated as unbounded.
    pub fn collection_limit(mut self, limit: u64) -> Self {
        if limit == 0 {
            tracing::warn!("collection limit of zero treated as unbounded");
        }
        self.limit = NonZeroU64::new(limit);
        self
    }

    /// Run the background task on `handle` instead of the current runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Apply serialized options on top of the builder's current state.
    pub fn options(mut self, options: CollectorOptions) -> Self {
        self = self.mode(options.mode);
        if let Some(limit) = options.collection_limit {
            self = self.collection_limit(limit);
        }
        self
    }

    /// Discover the target shape, spawn the background assembly task, and
    /// return a live handle.
    ///
    /// Collection starts immediately. Configuration failures (a shape with
    /// no usable fields, no runtime available) are delivered through
    /// `on_result` before this returns, and the returned handle is already
    /// cancelled.
    pub fn spawn<F>(self, on_result: F) -> Collector
    where
        F: FnMut(Result<R, CollectError>) + Send + 'static,
    {
        let mut on_result: ResultCallback<R> = Box::new(on_result);

        let registry = match FieldRegistry::discover::<R>() {
            Ok(registry) => registry,
            Err(error) => {
                tracing::error!(error = %error, "collector configuration rejected");
                on_result(Err(error));
                return Collector::cancelled(self.mode);
            }
        };

        let runtime = match self.runtime.map(Ok).unwrap_or_else(Handle::try_current) {
            Ok(handle) => handle,
            Err(_) => {
                let error = CollectError::Configuration(
                    "no tokio runtime available; provide one with CollectorBuilder::runtime"
                        .to_string(),
                );
                tracing::error!(error = %error, "collector configuration rejected");
                on_result(Err(error));
                return Collector::cancelled(self.mode);
            }
        };

        let shared = Arc::new(Shared::new(registry));
        let limit = self.limit.map(NonZeroU64::get);
        let task = runtime.spawn(worker::run::<R>(Arc::clone(&shared), on_result, limit));
        tracing::debug!(
            shape = std::any::type_name::<R>(),
            fields = shared.registry().len(),
            mode = %self.mode,
            "collector started"
        );
        Collector::started(shared, task, self.mode)
    }
}

impl<R: Record> Default for CollectorBuilder<R> {
    fn default() -> Self {
        Self::new()
    }
}
