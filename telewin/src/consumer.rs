//! Consumer sessions: wait for ticks, diff every series, ship the operations.
//!
//! A [`Consumer`] is one attached dashboard. It owns a [`SyncState`] per
//! series (created when the series first has data to send), a receiver of the
//! registry's update notification, and an [`Egress`] that knows how to reach
//! the renderer. Nothing in a consumer is shared with other tasks, so none of
//! it is locked; dropping the consumer detaches it.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use telewin::config::{SeriesConfig, WindowConfig};
//! use telewin::consumer::Consumer;
//! use telewin::mirror::MirrorSet;
//! use telewin::registry::Registry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = Arc::new(Registry::new(
//!     WindowConfig::default().with_series(SeriesConfig::new("soc", "pct")),
//! )?);
//! registry.push("soc", 81.0)?;
//! registry.tick();
//!
//! let mut consumer = Consumer::attach(Arc::clone(&registry), MirrorSet::new());
//! consumer.sync_now()?;
//! assert_eq!(consumer.egress().ys("soc"), Some(vec![81.0]));
//! # Ok(())
//! # }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::watch;

use crate::axis::AxisRange;
use crate::config::SeriesConfig;
use crate::error::Result;
use crate::registry::{Registry, SeriesHandle, UpdateSignal};
use crate::sync::{SyncOp, SyncState};

/// The rendering collaborator: where sync operations end up.
pub trait Egress {
    /// Identifies the consumer-side storage of one series.
    type Handle;

    /// Creates storage for a series that is about to receive its first
    /// [`SyncOp::ReplaceAll`].
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer cannot be reached.
    fn attach(&mut self, series: &SeriesConfig) -> Result<Self::Handle>;

    /// Applies one operation to a series' storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer cannot apply the operation.
    fn apply(&mut self, handle: &Self::Handle, op: &SyncOp) -> Result<()>;

    /// Receives the per-axis value ranges after each sync round.
    ///
    /// # Errors
    ///
    /// Returns an error if the renderer cannot be reached.
    fn axis_ranges(&mut self, _ranges: &BTreeMap<String, AxisRange>) -> Result<()> {
        Ok(())
    }
}

/// Summary of one sync round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Update generation the round answered (0 for an explicit sync).
    pub generation: u64,
    /// Series that received at least one operation.
    pub series_touched: usize,
    /// Operations sent in total.
    pub ops: usize,
}

/// One attached consumer of a [`Registry`].
pub struct Consumer<E: Egress> {
    registry: Arc<Registry>,
    updates: watch::Receiver<UpdateSignal>,
    states: HashMap<SeriesHandle, SyncState<E::Handle>>,
    egress: E,
}

impl<E: Egress> Consumer<E> {
    /// Attaches a consumer. Nothing is sent until the first sync.
    pub fn attach(registry: Arc<Registry>, egress: E) -> Self {
        let updates = registry.subscribe();
        tracing::info!(series = registry.len(), tick = registry.last_x(), "consumer attached");
        Self {
            registry,
            updates,
            states: HashMap::new(),
            egress,
        }
    }

    /// The egress this consumer writes to.
    pub fn egress(&self) -> &E {
        &self.egress
    }

    /// Mutable access to the egress.
    pub fn egress_mut(&mut self) -> &mut E {
        &mut self.egress
    }

    /// Sync state of a series, if it has been sent anything yet.
    pub fn state(&self, handle: SeriesHandle) -> Option<&SyncState<E::Handle>> {
        self.states.get(&handle)
    }

    /// Brings every series' mirror up to date right now.
    ///
    /// A series whose operations the egress rejected is resent in full on the
    /// next call.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the egress.
    pub fn sync_now(&mut self) -> Result<SyncReport> {
        let mut report = SyncReport::default();
        for handle in self.registry.handles() {
            let sent = self.sync_handle(handle)?;
            if sent > 0 {
                report.series_touched += 1;
                report.ops += sent;
            }
        }
        self.egress.axis_ranges(&self.registry.axis_ranges())?;
        Ok(report)
    }

    /// Brings one series' mirror up to date, returning the number of operations sent.
    ///
    /// # Errors
    ///
    /// Returns [`SeriesError::UnknownSeries`](crate::error::SeriesError::UnknownSeries)
    /// if no series has this name, or the error raised by the egress.
    pub fn sync_series(&mut self, name: &str) -> Result<usize> {
        let handle = self.registry.handle(name)?;
        self.sync_handle(handle)
    }

    fn sync_handle(&mut self, handle: SeriesHandle) -> Result<usize> {
        let Self {
            registry,
            states,
            egress,
            ..
        } = self;

        if !states.contains_key(&handle) {
            // Mirrors are created lazily, right before their first replace.
            let config = registry.with_series(handle, |series| {
                (!series.is_empty()).then(|| series.config().clone())
            })?;
            let Some(config) = config else {
                return Ok(0);
            };
            states.insert(handle, SyncState::new(egress.attach(&config)?));
        }
        let Some(state) = states.get_mut(&handle) else {
            return Ok(0);
        };

        let ops = registry.with_series(handle, |series| state.diff(series))?;
        for op in &ops {
            if let Err(e) = egress.apply(state.handle(), op) {
                // The mirror is in an unknown state; the next round replaces it.
                tracing::warn!(series = handle.index(), op = op.kind(), "egress failed: {e}");
                state.reset();
                return Err(e);
            }
        }
        Ok(ops.len())
    }

    /// Waits for the next signalled tick, then syncs every series.
    ///
    /// Returns `Ok(None)` once the registry has closed.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the egress.
    pub async fn next_update(&mut self) -> Result<Option<SyncReport>> {
        if self.updates.changed().await.is_err() {
            return Ok(None);
        }
        let signal = *self.updates.borrow_and_update();
        if signal.closed {
            return Ok(None);
        }
        let report = self.sync_now()?;
        tracing::trace!(
            generation = signal.generation,
            series = report.series_touched,
            ops = report.ops,
            "consumer synced"
        );
        Ok(Some(SyncReport {
            generation: signal.generation,
            ..report
        }))
    }

    /// Syncs once, then follows every update until the registry closes, then
    /// syncs a last time so the mirrors hold the final windows.
    ///
    /// Returns the egress so callers can inspect or reuse it.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by the egress; the consumer is dropped.
    pub async fn run(mut self) -> Result<E> {
        self.sync_now()?;
        while self.next_update().await?.is_some() {}
        self.sync_now()?;
        Ok(self.detach())
    }

    /// Detaches the consumer, discarding every sync state.
    pub fn detach(self) -> E {
        tracing::info!(series = self.states.len(), "consumer detached");
        self.egress
    }
}
