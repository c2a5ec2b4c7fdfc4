//! Cross-series extrema for series that share an axis.
//!
//! Nothing here is stored between calls: ranges are folded from each member
//! series' own `min_y` / `max_y`, which are already exact and O(1) to read.

use std::collections::BTreeMap;

use serde::Serialize;

/// Value range of one axis, over every non-empty member series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AxisRange {
    /// Smallest `min_y` among the members.
    pub min: f64,
    /// Largest `max_y` among the members.
    pub max: f64,
}

impl AxisRange {
    /// Width of the range.
    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    fn widen(&mut self, min: f64, max: f64) {
        self.min = self.min.min(min);
        self.max = self.max.max(max);
    }
}

/// Folds per-series extrema into per-axis ranges.
#[derive(Debug, Default)]
pub struct AxisAggregator {
    ranges: BTreeMap<String, AxisRange>,
}

impl AxisAggregator {
    /// Creates an empty aggregator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one member series. Empty series (no extrema) are skipped.
    pub fn include(&mut self, axis: &str, min_y: Option<f64>, max_y: Option<f64>) {
        let (Some(min), Some(max)) = (min_y, max_y) else {
            return;
        };
        match self.ranges.get_mut(axis) {
            Some(range) => range.widen(min, max),
            None => {
                self.ranges.insert(axis.to_string(), AxisRange { min, max });
            }
        }
    }

    /// Returns the ranges, keyed by axis name. Axes with no data are absent.
    pub fn finish(self) -> BTreeMap<String, AxisRange> {
        self.ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_members_share_axis() {
        let mut agg = AxisAggregator::new();
        agg.include("volts", Some(3.1), Some(3.4));
        agg.include("volts", Some(2.9), Some(3.3));
        agg.include("watts", Some(-200.0), Some(1500.0));
        let ranges = agg.finish();

        assert_eq!(ranges.len(), 2);
        assert_eq!(ranges["volts"], AxisRange { min: 2.9, max: 3.4 });
        assert!((ranges["watts"].span() - 1700.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_empty_members_do_not_contribute() {
        let mut agg = AxisAggregator::new();
        agg.include("volts", None, None);
        agg.include("amps", None, None);
        agg.include("amps", Some(1.0), Some(2.0));
        let ranges = agg.finish();

        assert!(!ranges.contains_key("volts"));
        assert_eq!(ranges["amps"], AxisRange { min: 1.0, max: 2.0 });
    }
}
