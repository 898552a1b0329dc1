//! Collection engine.
//!
//! One [`Collector`] owns a single-slot latest-value channel per field of
//! its target shape and a single background task that synchronizes those
//! channels into complete snapshots, assembles target instances from them,
//! and routes results to the caller's callback:
//!
//! - [`CollectorBuilder`]: configuration and startup
//! - [`Collector`]: live handle exposing `emit` and `cancel`
//! - [`Mode`] / [`CollectorOptions`]: engine variant selection
//! - [`CollectError`]: unified error surface, delivered through the same
//!   result callback as success

mod builder;
mod channel;
mod error;
mod handle;
mod registry;
mod sync;
mod worker;

pub use builder::{CollectorBuilder, CollectorOptions, Mode};
pub use error::CollectError;
pub use handle::{Collector, CollectorState};
