//! A single named, independently windowed sample sequence.
//!
//! A [`Series`] stores `(x, y)` samples where `x` is the engine's tick and `y`
//! is the measured value. Samples older than the retention window are evicted
//! logically by advancing an `offset`, and physically by an occasional
//! compaction that drops the evicted prefix.
//!
//! # Design
//!
//! - Ticks are strictly increasing inside a series. A second sample for the
//!   same tick, or a sample for an older tick, is dropped without error.
//! - `min_y` / `max_y` are served from two monotonic queues keyed by tick, so
//!   both appends and evictions keep the extrema exact in amortized O(1).
//! - Compaction runs once the evicted prefix exceeds a quarter of the
//!   capacity, bounding storage to about `capacity * 5 / 4` samples.
//!   Nothing keyed by tick value observes it.

use std::collections::VecDeque;

use serde::Serialize;

use crate::config::SeriesConfig;
use crate::error::{Result, SampleError};

/// A tick of the engine's logical clock; the x-coordinate of every sample.
///
/// Signed so that a retention cutoff (`last_x - retention_span`) may be
/// negative early in a run.
pub type Tick = i64;

/// Upper bound on the samples reserved when a series is created.
pub const PREALLOCATED_SAMPLES: usize = 4096;

/// One named sample sequence with a bounded window and running extrema.
#[derive(Debug, Clone)]
pub struct Series {
    /// Static description (name, axis, cosmetics).
    config: SeriesConfig,
    /// Stored ticks; `xs[offset..]` is the live window.
    xs: Vec<Tick>,
    /// Stored values, parallel to `xs`.
    ys: Vec<f64>,
    /// Index of the first in-window sample.
    offset: usize,
    /// Number of ticks the window retains.
    capacity: usize,
    /// Last tick ever accepted, kept across compaction for de-duplication.
    last_tick: Option<Tick>,
    /// Candidate minima, ascending by value and by tick.
    min_queue: VecDeque<(Tick, f64)>,
    /// Candidate maxima, descending by value, ascending by tick.
    max_queue: VecDeque<(Tick, f64)>,
    /// Set when a sample was accepted since the last [`Series::take_dirty`].
    dirty: bool,
}

/// Owned copy of a series window, for callers that cannot hold the series lock.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    /// Series name.
    pub name: String,
    /// In-window ticks.
    pub xs: Vec<Tick>,
    /// In-window values.
    pub ys: Vec<f64>,
    /// Minimum value in the window.
    pub min_y: Option<f64>,
    /// Maximum value in the window.
    pub max_y: Option<f64>,
}

impl Series {
    /// Creates an empty series retaining `capacity` ticks.
    ///
    /// Storage is reserved up to [`PREALLOCATED_SAMPLES`] and grows on demand
    /// beyond that.
    pub fn new(config: SeriesConfig, capacity: usize) -> Self {
        let reserve = capacity.min(PREALLOCATED_SAMPLES);
        Self {
            config,
            xs: Vec::with_capacity(reserve),
            ys: Vec::with_capacity(reserve),
            offset: 0,
            capacity: capacity.max(1),
            last_tick: None,
            min_queue: VecDeque::new(),
            max_queue: VecDeque::new(),
            dirty: false,
        }
    }

    /// Appends a sample.
    ///
    /// Returns `Ok(true)` if the sample was stored and `Ok(false)` if it was
    /// dropped because its tick is not newer than the last stored tick.
    ///
    /// # Errors
    ///
    /// Returns [`SampleError::InvalidSample`] if `y` is NaN or infinite.
    pub fn add(&mut self, x: Tick, y: f64) -> Result<bool> {
        if !y.is_finite() {
            tracing::warn!(series = %self.config.name, x, y, "rejecting non-finite sample");
            return Err(SampleError::InvalidSample {
                series: self.config.name.clone(),
                x,
                value: y,
            }
            .into());
        }
        if self.last_tick.is_some_and(|last| x <= last) {
            return Ok(false);
        }

        self.xs.push(x);
        self.ys.push(y);
        self.last_tick = Some(x);

        while self.min_queue.back().is_some_and(|&(_, v)| v >= y) {
            self.min_queue.pop_back();
        }
        self.min_queue.push_back((x, y));

        while self.max_queue.back().is_some_and(|&(_, v)| v <= y) {
            self.max_queue.pop_back();
        }
        self.max_queue.push_back((x, y));

        self.dirty = true;
        Ok(true)
    }

    /// Evicts every in-window sample with `x < cutoff`.
    ///
    /// Returns the number of samples evicted.
    pub fn trim(&mut self, cutoff: Tick) -> usize {
        let evicted = self.xs[self.offset..].partition_point(|&x| x < cutoff);
        if evicted == 0 {
            return 0;
        }
        self.offset += evicted;

        while self.min_queue.front().is_some_and(|&(x, _)| x < cutoff) {
            self.min_queue.pop_front();
        }
        while self.max_queue.front().is_some_and(|&(x, _)| x < cutoff) {
            self.max_queue.pop_front();
        }

        if self.offset > self.capacity / 4 {
            self.compact();
        }
        evicted
    }

    /// Drops the physically stored, logically evicted prefix.
    fn compact(&mut self) {
        tracing::trace!(
            series = %self.config.name,
            dropped = self.offset,
            kept = self.xs.len() - self.offset,
            "compacting series"
        );
        self.xs.drain(..self.offset);
        self.ys.drain(..self.offset);
        self.offset = 0;
    }

    /// Returns the series name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns the axis the series is plotted against.
    pub fn axis(&self) -> &str {
        &self.config.axis
    }

    /// Returns the static description of this series.
    pub fn config(&self) -> &SeriesConfig {
        &self.config
    }

    /// Returns the number of ticks the window retains.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// In-window ticks, oldest first.
    pub fn windowed_x(&self) -> &[Tick] {
        &self.xs[self.offset..]
    }

    /// In-window values, parallel to [`Series::windowed_x`].
    pub fn windowed_y(&self) -> &[f64] {
        &self.ys[self.offset..]
    }

    /// In-window `(x, y)` pairs, oldest first.
    pub fn windowed(&self) -> impl Iterator<Item = (Tick, f64)> + '_ {
        self.windowed_x()
            .iter()
            .copied()
            .zip(self.windowed_y().iter().copied())
    }

    /// Minimum value in the window, or `None` if the window is empty.
    pub fn min_y(&self) -> Option<f64> {
        self.min_queue.front().map(|&(_, y)| y)
    }

    /// Maximum value in the window, or `None` if the window is empty.
    pub fn max_y(&self) -> Option<f64> {
        self.max_queue.front().map(|&(_, y)| y)
    }

    /// Tick of the oldest in-window sample.
    pub fn first_x(&self) -> Option<Tick> {
        self.windowed_x().first().copied()
    }

    /// Tick of the newest in-window sample.
    ///
    /// `None` is the "empty" sentinel: every sample has aged out, or none
    /// was ever added.
    pub fn last_x(&self) -> Option<Tick> {
        self.windowed_x().last().copied()
    }

    /// Number of samples in the window.
    pub fn len(&self) -> usize {
        self.xs.len() - self.offset
    }

    /// Returns `true` if the window holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of samples physically stored, evicted prefix included.
    pub fn stored_len(&self) -> usize {
        self.xs.len()
    }

    /// Number of in-window samples with a tick `<= x`.
    pub fn count_through(&self, x: Tick) -> usize {
        self.windowed_x().partition_point(|&v| v <= x)
    }

    /// Returns whether a sample was accepted since the last call, and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Returns whether a sample was accepted since the flag was last cleared.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Copies the current window out.
    pub fn snapshot(&self) -> SeriesSnapshot {
        SeriesSnapshot {
            name: self.config.name.clone(),
            xs: self.windowed_x().to_vec(),
            ys: self.windowed_y().to_vec(),
            min_y: self.min_y(),
            max_y: self.max_y(),
        }
    }
}
