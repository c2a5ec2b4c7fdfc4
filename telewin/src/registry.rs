//! The set of live series, the global tick clock, and the update notification.
//!
//! # Overview
//!
//! - [`SeriesHandle`] - `Copy` index used by producers on the hot path
//! - [`Registry`] - owns every [`Series`], the tick counter `last_x`, and the
//!   "updated" signal consumers wait on
//! - [`TickOutcome`] - what a single call to [`Registry::tick`] did
//!
//! # Locking
//!
//! Each series sits behind its own mutex, so producers of different series
//! never contend and `add`/`trim` on the same series are serialized. The
//! table of series is behind an `RwLock` that is only written on registration.
//! No lock is ever held across an `.await`.
//!
//! The update signal is a `tokio::sync::watch` channel: [`Registry::tick`] is
//! its only writer and bumps a generation counter, which wakes every receiver
//! exactly once per signalled tick.
//!
//! # Example
//!
//! ```rust
//! use telewin::config::{SeriesConfig, WindowConfig};
//! use telewin::registry::Registry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = WindowConfig::default().with_series(SeriesConfig::new("grid.power", "watts"));
//! let registry = Registry::new(config)?;
//!
//! registry.push("grid.power", 1250.0)?;
//! let outcome = registry.tick();
//! assert!(outcome.signalled);
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::watch;

use crate::axis::{AxisAggregator, AxisRange};
use crate::config::{SeriesConfig, WindowConfig};
use crate::error::{ConfigError, Result, SeriesError};
use crate::series::{Series, SeriesSnapshot, Tick};

/// Opaque, `Copy` handle for a registered series.
///
/// Handles are only meaningful for the registry that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesHandle {
    index: usize,
}

impl SeriesHandle {
    /// Position of the series in registration order.
    pub fn index(self) -> usize {
        self.index
    }
}

/// State carried by the update notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSignal {
    /// Number of ticks so far that changed at least one series.
    pub generation: u64,
    /// Set once the registry stops ticking; consumers should finish.
    pub closed: bool,
}

/// Result of one [`Registry::tick`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickOutcome {
    /// The new value of `last_x`.
    pub tick: Tick,
    /// Whether consumers were woken. `false` for idle ticks.
    pub signalled: bool,
    /// Samples evicted across all series.
    pub evicted: usize,
}

#[derive(Debug, Default)]
struct SeriesTable {
    by_name: HashMap<String, SeriesHandle>,
    series: Vec<Arc<Mutex<Series>>>,
}

/// Owner of all series, the tick clock, and the update notification.
///
/// Share it behind an `Arc`; every method takes `&self`.
#[derive(Debug)]
pub struct Registry {
    retention_span: Tick,
    capacity: usize,
    tick_period: Duration,
    table: RwLock<SeriesTable>,
    last_x: AtomicI64,
    updates: watch::Sender<UpdateSignal>,
}

fn lock(series: &Mutex<Series>) -> MutexGuard<'_, Series> {
    series.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Registry {
    /// Builds a registry and registers every series in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidConfiguration`] if the configuration fails
    /// validation. This is the only place configuration errors surface.
    pub fn new(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        let capacity = usize::try_from(config.retention_span).map_err(|_| {
            ConfigError::InvalidConfiguration {
                reason: format!("retention span {} does not fit in memory", config.retention_span),
            }
        })?;

        let (updates, _) = watch::channel(UpdateSignal::default());
        let registry = Self {
            retention_span: config.retention_span,
            capacity,
            tick_period: config.tick_period(),
            table: RwLock::new(SeriesTable::default()),
            last_x: AtomicI64::new(0),
            updates,
        };
        for series in config.series {
            registry.register(series)?;
        }
        Ok(registry)
    }

    /// Registers a series, or returns the handle of the one already using this name.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::InvalidName`] if the name is empty.
    pub fn register(&self, config: SeriesConfig) -> Result<SeriesHandle> {
        if config.name.is_empty() {
            return Err(SeriesError::InvalidName {
                name: config.name,
                reason: "name cannot be empty".to_string(),
            }
            .into());
        }

        let mut table = self.table.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(&handle) = table.by_name.get(&config.name) {
            return Ok(handle);
        }

        let handle = SeriesHandle {
            index: table.series.len(),
        };
        tracing::debug!(series = %config.name, axis = %config.axis, index = handle.index, "registered series");
        table.by_name.insert(config.name.clone(), handle);
        table
            .series
            .push(Arc::new(Mutex::new(Series::new(config, self.capacity))));
        Ok(handle)
    }

    /// Looks up a series by name.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::UnknownSeries`] if no series has this name.
    pub fn handle(&self, name: &str) -> Result<SeriesHandle> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.by_name.get(name).copied().ok_or_else(|| {
            SeriesError::UnknownSeries {
                name: name.to_string(),
            }
            .into()
        })
    }

    fn cell(&self, handle: SeriesHandle) -> Result<Arc<Mutex<Series>>> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        table.series.get(handle.index).cloned().ok_or_else(|| {
            SeriesError::InvalidHandle {
                index: handle.index,
            }
            .into()
        })
    }

    fn cells(&self) -> Vec<Arc<Mutex<Series>>> {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .series
            .clone()
    }

    /// Adds a sample stamped with an explicit tick.
    ///
    /// Returns `Ok(false)` for duplicate or out-of-order ticks.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::InvalidHandle`] for a foreign handle and
    /// [`SampleError::InvalidSample`](crate::error::SampleError::InvalidSample)
    /// for a non-finite value.
    pub fn add(&self, handle: SeriesHandle, x: Tick, y: f64) -> Result<bool> {
        let cell = self.cell(handle)?;
        let mut series = lock(&cell);
        series.add(x, y)
    }

    /// Adds a sample stamped with the current tick.
    ///
    /// This is the ingestion entry point for sources: the engine, not the
    /// source, owns the clock.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::UnknownSeries`] if no series has this name, and
    /// the errors of [`Registry::add`].
    pub fn push(&self, name: &str, y: f64) -> Result<bool> {
        let handle = self.handle(name)?;
        self.add(handle, self.last_x(), y)
    }

    /// Advances the clock by one tick.
    ///
    /// If no series accepted a sample since the previous tick this is an idle
    /// tick: nothing is trimmed and nobody is woken. Otherwise every series is
    /// trimmed to `last_x - retention_span` and the update notification fires.
    ///
    /// Must only be called from one task at a time (the tick driver).
    pub fn tick(&self) -> TickOutcome {
        let tick = self.last_x.fetch_add(1, Ordering::SeqCst) + 1;
        let cells = self.cells();

        let mut changed = false;
        for cell in &cells {
            changed |= lock(cell).take_dirty();
        }
        if !changed {
            tracing::trace!(tick, "idle tick");
            return TickOutcome {
                tick,
                signalled: false,
                evicted: 0,
            };
        }

        let cutoff = tick - self.retention_span;
        let mut evicted = 0;
        for cell in &cells {
            let mut series = lock(cell);
            let n = series.trim(cutoff);
            if n > 0 {
                tracing::trace!(series = %series.name(), evicted = n, cutoff, "trimmed series");
            }
            evicted += n;
        }

        self.updates.send_modify(|signal| signal.generation += 1);
        tracing::debug!(tick, cutoff, evicted, series = cells.len(), "tick signalled");
        TickOutcome {
            tick,
            signalled: true,
            evicted,
        }
    }

    /// Subscribes to the update notification.
    ///
    /// The receiver starts out having seen the current generation, so its
    /// first `changed()` resolves on the next signalled tick.
    pub fn subscribe(&self) -> watch::Receiver<UpdateSignal> {
        self.updates.subscribe()
    }

    /// Marks the registry closed and wakes every consumer one last time.
    pub fn close(&self) {
        self.updates.send_modify(|signal| signal.closed = true);
    }

    /// Returns `true` once [`Registry::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.updates.borrow().closed
    }

    /// Current value of the tick counter.
    pub fn last_x(&self) -> Tick {
        self.last_x.load(Ordering::SeqCst)
    }

    /// Number of ticks each series retains.
    pub fn retention_span(&self) -> Tick {
        self.retention_span
    }

    /// Period the tick driver runs at.
    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    /// Runs `f` with shared access to a series while holding its lock.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::InvalidHandle`] for a foreign handle.
    pub fn with_series<R>(&self, handle: SeriesHandle, f: impl FnOnce(&Series) -> R) -> Result<R> {
        let cell = self.cell(handle)?;
        let series = lock(&cell);
        Ok(f(&series))
    }

    /// Copies the current window of a series.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::UnknownSeries`] if no series has this name.
    pub fn snapshot(&self, name: &str) -> Result<SeriesSnapshot> {
        let handle = self.handle(name)?;
        self.with_series(handle, Series::snapshot)
    }

    /// Handles of all series, in registration order.
    pub fn handles(&self) -> Vec<SeriesHandle> {
        let table = self.table.read().unwrap_or_else(PoisonError::into_inner);
        (0..table.series.len())
            .map(|index| SeriesHandle { index })
            .collect()
    }

    /// Names of all series, in registration order.
    pub fn series_names(&self) -> Vec<String> {
        self.cells()
            .iter()
            .map(|cell| lock(cell).name().to_string())
            .collect()
    }

    /// Number of registered series.
    pub fn len(&self) -> usize {
        self.table
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .series
            .len()
    }

    /// Returns `true` if no series is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value range of every axis, folded from member series' extrema.
    pub fn axis_ranges(&self) -> BTreeMap<String, AxisRange> {
        let mut agg = AxisAggregator::new();
        for cell in self.cells() {
            let series = lock(&cell);
            agg.include(series.axis(), series.min_y(), series.max_y());
        }
        agg.finish()
    }
}
