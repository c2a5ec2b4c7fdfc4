//! In-memory reference renderer.
//!
//! [`MirrorSet`] implements [`Egress`] by applying every [`SyncOp`] to a pair
//! of deques per series, exactly as a remote plot would. It is what the
//! engine's own tests use to check that a mirror always ends up equal to the
//! series window, and it doubles as a local sink for embedding.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::axis::AxisRange;
use crate::config::SeriesConfig;
use crate::consumer::Egress;
use crate::error::{EgressError, Result};
use crate::series::Tick;
use crate::sync::SyncOp;

/// Handle naming one mirror inside a [`MirrorSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MirrorId(u64);

/// Consumer-side copy of one series.
#[derive(Debug, Clone, Default)]
pub struct Mirror {
    config: Option<SeriesConfig>,
    xs: VecDeque<Tick>,
    ys: VecDeque<f64>,
}

impl Mirror {
    /// Mirrored ticks, oldest first.
    pub fn xs(&self) -> Vec<Tick> {
        self.xs.iter().copied().collect()
    }

    /// Mirrored values, oldest first.
    pub fn ys(&self) -> Vec<f64> {
        self.ys.iter().copied().collect()
    }

    /// Number of mirrored samples.
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// Returns `true` if nothing is mirrored.
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// The series description the mirror was attached with.
    pub fn config(&self) -> Option<&SeriesConfig> {
        self.config.as_ref()
    }

    fn apply(&mut self, id: MirrorId, op: &SyncOp) -> Result<()> {
        match op {
            SyncOp::ReplaceAll { xs, ys } => {
                self.xs.clear();
                self.ys.clear();
                self.xs.extend(xs);
                self.ys.extend(ys);
            }
            SyncOp::DropFromFront { count } => {
                if *count > self.xs.len() {
                    return Err(EgressError::DropBeyondMirror {
                        handle: id.0,
                        len: self.xs.len(),
                        count: *count,
                    }
                    .into());
                }
                self.xs.drain(..*count);
                self.ys.drain(..*count);
            }
            SyncOp::Append { xs, ys } => {
                self.xs.extend(xs);
                self.ys.extend(ys);
            }
        }
        Ok(())
    }
}

/// A set of in-memory mirrors, one per attached series.
#[derive(Debug, Default)]
pub struct MirrorSet {
    mirrors: Vec<Mirror>,
    by_name: HashMap<String, MirrorId>,
    axes: BTreeMap<String, AxisRange>,
    log: Vec<(String, SyncOp)>,
}

impl MirrorSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The mirror of a series, if it has been attached.
    pub fn get(&self, name: &str) -> Option<&Mirror> {
        let id = self.by_name.get(name)?;
        self.mirrors.get(usize::try_from(id.0).ok()?)
    }

    /// Mirrored ticks of a series.
    pub fn xs(&self, name: &str) -> Option<Vec<Tick>> {
        self.get(name).map(Mirror::xs)
    }

    /// Mirrored values of a series.
    pub fn ys(&self, name: &str) -> Option<Vec<f64>> {
        self.get(name).map(Mirror::ys)
    }

    /// Axis ranges received with the last sync round.
    pub fn axes(&self) -> &BTreeMap<String, AxisRange> {
        &self.axes
    }

    /// Number of attached mirrors.
    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    /// Returns `true` if nothing has been attached.
    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Takes the `(series, op)` log of everything applied since the last call.
    pub fn take_log(&mut self) -> Vec<(String, SyncOp)> {
        std::mem::take(&mut self.log)
    }
}

impl Egress for MirrorSet {
    type Handle = MirrorId;

    fn attach(&mut self, series: &SeriesConfig) -> Result<MirrorId> {
        let id = MirrorId(self.mirrors.len() as u64);
        self.mirrors.push(Mirror {
            config: Some(series.clone()),
            ..Mirror::default()
        });
        self.by_name.insert(series.name.clone(), id);
        Ok(id)
    }

    fn apply(&mut self, handle: &MirrorId, op: &SyncOp) -> Result<()> {
        let mirror = usize::try_from(handle.0)
            .ok()
            .and_then(|index| self.mirrors.get_mut(index))
            .ok_or(EgressError::UnknownHandle { handle: handle.0 })?;
        mirror.apply(*handle, op)?;

        let name = mirror
            .config
            .as_ref()
            .map(|config| config.name.clone())
            .unwrap_or_default();
        self.log.push((name, op.clone()));
        Ok(())
    }

    fn axis_ranges(&mut self, ranges: &BTreeMap<String, AxisRange>) -> Result<()> {
        self.axes.clone_from(ranges);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelewinError;

    #[test]
    fn test_ops_apply_in_order() {
        let mut set = MirrorSet::new();
        let id = set.attach(&SeriesConfig::new("a", "v")).unwrap();
        set.apply(
            &id,
            &SyncOp::ReplaceAll {
                xs: vec![1, 2, 3],
                ys: vec![1.0, 2.0, 3.0],
            },
        )
        .unwrap();
        set.apply(&id, &SyncOp::DropFromFront { count: 2 }).unwrap();
        set.apply(
            &id,
            &SyncOp::Append {
                xs: vec![4],
                ys: vec![4.0],
            },
        )
        .unwrap();

        assert_eq!(set.xs("a"), Some(vec![3, 4]));
        assert_eq!(set.ys("a"), Some(vec![3.0, 4.0]));
        assert_eq!(set.take_log().len(), 3);
        assert!(set.take_log().is_empty());
    }

    #[test]
    fn test_drop_beyond_mirror_is_rejected() {
        let mut set = MirrorSet::new();
        let id = set.attach(&SeriesConfig::new("a", "v")).unwrap();
        assert!(matches!(
            set.apply(&id, &SyncOp::DropFromFront { count: 1 }),
            Err(TelewinError::Egress(EgressError::DropBeyondMirror { .. }))
        ));
    }

    #[test]
    fn test_unknown_handle() {
        let mut set = MirrorSet::new();
        assert!(matches!(
            set.apply(&MirrorId(9), &SyncOp::DropFromFront { count: 0 }),
            Err(TelewinError::Egress(EgressError::UnknownHandle { handle: 9 }))
        ));
    }

    #[test]
    fn test_axis_ranges_are_stored() {
        let mut set = MirrorSet::new();
        let mut ranges = BTreeMap::new();
        ranges.insert("volts".to_string(), AxisRange { min: 3.0, max: 3.5 });
        set.axis_ranges(&ranges).unwrap();
        assert_eq!(set.axes(), &ranges);
    }
}
