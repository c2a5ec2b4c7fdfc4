//! # telewin
//!
//! Live telemetry windows with minimal-diff synchronization to remote renderers.
//!
//! telewin ingests a continuous stream of scalar measurements from many
//! independent sources, keeps a bounded rolling history per source, and keeps
//! any number of remote dashboards in sync with that history without ever
//! resending samples a dashboard already holds.
//!
//! **Status**: This crate is in early development. The API is not yet stable.
//!
//! ## Key Properties
//!
//! - Bounded memory per series, independent of run length
//! - Exact running `min_y` / `max_y` under both appends and evictions
//! - Per-consumer diffs: one full replace on attach, then only drops and appends
//! - Consumers are woken once per tick that changed data, never on idle ticks
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use telewin::{Consumer, MirrorSet, Registry, SeriesConfig, SyncOp, WindowConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WindowConfig { retention_span: 5, ..WindowConfig::default() }
//!     .with_series(SeriesConfig::new("batt.current", "amps"));
//! let registry = Arc::new(Registry::new(config)?);
//! let batt = registry.handle("batt.current")?;
//!
//! registry.add(batt, 1, 10.0)?;
//! registry.add(batt, 2, 20.0)?;
//! registry.tick();
//!
//! let mut consumer = Consumer::attach(Arc::clone(&registry), MirrorSet::new());
//! consumer.sync_now()?;
//!
//! registry.add(batt, 3, 15.0)?;
//! registry.tick();
//! consumer.sync_now()?;
//!
//! let log = consumer.egress_mut().take_log();
//! assert_eq!(log[1].1, SyncOp::Append { xs: vec![3], ys: vec![15.0] });
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`Series`] — One windowed sample sequence with running extrema
//! - [`Registry`] — Owns all series, the tick clock, and the update signal
//! - [`TickDriver`] — Advances the clock on a fixed period
//! - [`SyncState`] — Per-consumer, per-series record producing minimal diffs
//! - [`Consumer`] — Waits for updates and pushes diffs through an [`Egress`]
//!
//! ## Modules
//!
//! - [`series`] — Windowing, eviction, compaction, extrema
//! - [`registry`] — Series table, tick clock, notification
//! - [`driver`] — Periodic tick task
//! - [`sync`] — Diff protocol and operations
//! - [`consumer`] — Consumer sessions and the egress seam
//! - [`mirror`] — In-memory egress
//! - [`export`] — JSON-lines egress
//! - [`axis`] — Cross-series axis extrema
//! - [`config`] — Window configuration
//! - [`error`] — Error types

pub mod axis;
pub mod config;
pub mod consumer;
pub mod driver;
pub mod error;
pub mod export;
pub mod mirror;
pub mod registry;
pub mod series;
pub mod sync;

// Re-export primary API types at crate root for convenience.
pub use axis::AxisRange;
pub use config::{SeriesConfig, WindowConfig};
pub use consumer::{Consumer, Egress, SyncReport};
pub use driver::{DriverStats, TickDriver};
pub use error::{Result, TelewinError};
pub use export::JsonLinesEgress;
pub use mirror::MirrorSet;
pub use registry::{Registry, SeriesHandle, TickOutcome};
pub use series::{Series, SeriesSnapshot, Tick};
pub use sync::{SyncOp, SyncState};
