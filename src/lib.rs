//! Tributary - Field-Synchronized Record Assembly
//!
//! Declare a target record type, feed values for its fields from any number
//! of concurrent tasks, in any order, and receive a fully populated instance
//! once every field has a value.
//!
//! # Architecture
//!
//! - **Schema**: [`record!`] declares a struct together with its field
//!   descriptor table ([`Record`] / [`FieldSpec`]), so construction by name
//!   is a static, checked operation
//! - **Channels**: one single-slot latest-value channel per field; a newer
//!   value overwrites an unconsumed older one
//! - **Collector**: a background task joins the latest value of every field
//!   into a [`Snapshot`] each time all fields have published, assembles an
//!   instance, and routes it to the caller's result callback
//!
//! # Example
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use tributary::{CollectError, Collector};
//!
//! tributary::record! {
//!     #[derive(Debug)]
//!     struct Reading {
//!         sensor: String,
//!         value: f64,
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let (tx, mut rx) = mpsc::unbounded_channel();
//!     let collector = Collector::single_use(move |result: Result<Reading, CollectError>| {
//!         let _ = tx.send(result);
//!     });
//!
//!     collector.emit("value", 21.5_f64).unwrap();
//!     collector.emit("sensor", "thermocouple-4".to_string()).unwrap();
//!
//!     let reading = rx.recv().await.unwrap().unwrap();
//!     println!("{reading:?}");
//! }
//! ```

pub mod collector;
pub mod schema;

pub use collector::{
    CollectError, Collector, CollectorBuilder, CollectorOptions, CollectorState, Mode,
};
pub use schema::{FieldSpec, Record, Snapshot};
