//! drawsync-core library.
//!
//! Keeps one bounded JSON history per lottery series in step with a remote
//! results API, fetching only contests the local file has not seen.
//!
//! # Conventions
//!
//! - **Errors**: `thiserror` enums per concern, each mapped to an
//!   [`ErrorCode`]; [`SyncError`] unifies a series' failure.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod config;
pub mod driver;
pub mod error;
pub mod fetch;
pub mod lock;
pub mod model;
pub mod normalize;
pub mod reconcile;
pub mod stats;
pub mod store;

pub use error::ErrorCode;
pub use model::{ContestNumber, Draw, HistoryDocument, SeriesId};
pub use reconcile::{ReconcileReport, Reconciler, SyncError};
