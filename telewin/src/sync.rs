//! Minimal-diff synchronization of a series window to a remote mirror.
//!
//! A [`SyncState`] remembers which ticks one consumer already holds for one
//! series and, given the series' current window, produces the smallest list
//! of [`SyncOp`]s that brings the mirror up to date.
//!
//! # Protocol
//!
//! - **First sync**: one [`SyncOp::ReplaceAll`] with the whole window.
//! - **Incremental sync**: an optional [`SyncOp::DropFromFront`] for samples
//!   that aged out, then an optional [`SyncOp::Append`] for samples newer than
//!   anything the mirror holds. Drops always come first so that positional
//!   splices on the remote side stay valid.
//! - **Resync**: if the mirror no longer shares any sample with the window
//!   (the consumer fell so far behind that everything it knew was evicted),
//!   the diff is a fresh `ReplaceAll`.
//! - **Empty window**: no operation. The mirror keeps its last content, so a
//!   source that blips offline does not make the dashboard flicker.
//!
//! Remembered state is keyed on tick values, never on storage indices, so
//! series compaction is invisible here.

use serde::{Deserialize, Serialize};

use crate::series::{Series, Tick};

/// One operation on a remote series mirror.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SyncOp {
    /// Discard the mirror's content and replace it with these samples.
    ReplaceAll {
        /// Ticks, oldest first.
        xs: Vec<Tick>,
        /// Values, parallel to `xs`.
        ys: Vec<f64>,
    },
    /// Remove `count` samples from the head of the mirror.
    DropFromFront {
        /// Number of samples to remove.
        count: usize,
    },
    /// Append these samples to the tail of the mirror.
    Append {
        /// Ticks, oldest first.
        xs: Vec<Tick>,
        /// Values, parallel to `xs`.
        ys: Vec<f64>,
    },
}

impl SyncOp {
    /// Short name of the operation, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReplaceAll { .. } => "replace_all",
            Self::DropFromFront { .. } => "drop_from_front",
            Self::Append { .. } => "append",
        }
    }
}

/// Tick range (and sample count) a mirror is known to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownRange {
    /// Oldest tick in the mirror.
    pub min_x: Tick,
    /// Newest tick in the mirror.
    pub max_x: Tick,
    /// Number of samples in the mirror.
    pub len: usize,
}

/// Per-(consumer, series) record of what the consumer's mirror holds.
///
/// `H` is the egress-defined handle naming the mirror's storage; this type
/// only carries it.
#[derive(Debug, Clone)]
pub struct SyncState<H> {
    handle: H,
    known: Option<KnownRange>,
}

impl<H> SyncState<H> {
    /// Creates a state for a mirror that holds nothing yet.
    pub fn new(handle: H) -> Self {
        Self {
            handle,
            known: None,
        }
    }

    /// The egress handle of the mirror.
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// What the mirror is believed to hold, or `None` before the first sync.
    pub fn known(&self) -> Option<KnownRange> {
        self.known
    }

    /// Forgets the known range; the next diff is a full replace.
    pub fn reset(&mut self) {
        self.known = None;
    }

    /// Computes the operations that bring the mirror up to `series`' window
    /// and records the window as known.
    ///
    /// Returns an empty list when the mirror is already current or the window
    /// is empty.
    pub fn diff(&mut self, series: &Series) -> Vec<SyncOp> {
        let (Some(first), Some(last)) = (series.first_x(), series.last_x()) else {
            return Vec::new();
        };
        let xs = series.windowed_x();
        let ys = series.windowed_y();

        let ops = match self.known {
            Some(known) if known.min_x <= first && known.max_x >= first && known.max_x <= last => {
                let kept = series.count_through(known.max_x);
                match known.len.checked_sub(kept) {
                    Some(dropped) => {
                        let mut ops = Vec::with_capacity(2);
                        if dropped > 0 {
                            ops.push(SyncOp::DropFromFront { count: dropped });
                        }
                        if kept < xs.len() {
                            ops.push(SyncOp::Append {
                                xs: xs[kept..].to_vec(),
                                ys: ys[kept..].to_vec(),
                            });
                        }
                        ops
                    }
                    // The mirror holds fewer samples than the overlap implies.
                    None => vec![replace_all(xs, ys)],
                }
            }
            Some(known) => {
                tracing::debug!(
                    series = %series.name(),
                    known_min = known.min_x,
                    known_max = known.max_x,
                    first,
                    last,
                    "mirror out of reach of window, resyncing"
                );
                vec![replace_all(xs, ys)]
            }
            None => vec![replace_all(xs, ys)],
        };

        self.known = Some(KnownRange {
            min_x: first,
            max_x: last,
            len: xs.len(),
        });
        ops
    }
}

fn replace_all(xs: &[Tick], ys: &[f64]) -> SyncOp {
    SyncOp::ReplaceAll {
        xs: xs.to_vec(),
        ys: ys.to_vec(),
    }
}
