//! JSON-lines egress for shipping sync operations over a byte stream.
//!
//! [`JsonLinesEgress`] writes one JSON object per line to any [`Write`]:
//!
//! ```text
//! {"attach":"grid.power","mirror":0,"axis":"watts","title":"Grid"}
//! {"series":"grid.power","mirror":0,"op":"replace_all","xs":[1,2],"ys":[10.0,20.0]}
//! {"series":"grid.power","mirror":0,"op":"append","xs":[3],"ys":[15.0]}
//! {"axes":{"watts":{"min":10.0,"max":20.0}}}
//! ```
//!
//! Operations carry the same tags as [`SyncOp`]'s serde representation, so
//! the receiving side can deserialize them directly.

use std::collections::BTreeMap;
use std::io::Write;

use serde::Serialize;

use crate::axis::AxisRange;
use crate::config::SeriesConfig;
use crate::consumer::Egress;
use crate::error::{EgressError, Result};
use crate::sync::SyncOp;

/// Handle of a series stream inside a [`JsonLinesEgress`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamHandle {
    mirror: u64,
    series: String,
}

#[derive(Serialize)]
struct AttachLine<'a> {
    attach: &'a str,
    mirror: u64,
    axis: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<&'a str>,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    color: Option<&'a str>,
}

#[derive(Serialize)]
struct OpLine<'a> {
    series: &'a str,
    mirror: u64,
    #[serde(flatten)]
    op: &'a SyncOp,
}

#[derive(Serialize)]
struct AxesLine<'a> {
    axes: &'a BTreeMap<String, AxisRange>,
}

/// Egress that serializes every operation as a JSON line.
#[derive(Debug)]
pub struct JsonLinesEgress<W: Write> {
    writer: W,
    next_mirror: u64,
    emit_axes: bool,
}

impl<W: Write> JsonLinesEgress<W> {
    /// Wraps a writer. Axis ranges are emitted after every sync round.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            next_mirror: 0,
            emit_axes: true,
        }
    }

    /// Enables or disables the per-round `axes` line.
    #[must_use]
    pub fn with_axes(mut self, emit_axes: bool) -> Self {
        self.emit_axes = emit_axes;
        self
    }

    /// Returns the wrapped writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_line<T: Serialize>(&mut self, line: &T) -> Result<()> {
        serde_json::to_writer(&mut self.writer, line).map_err(EgressError::from)?;
        self.writer.write_all(b"\n").map_err(EgressError::from)?;
        Ok(())
    }
}

impl<W: Write> Egress for JsonLinesEgress<W> {
    type Handle = StreamHandle;

    fn attach(&mut self, series: &SeriesConfig) -> Result<StreamHandle> {
        let handle = StreamHandle {
            mirror: self.next_mirror,
            series: series.name.clone(),
        };
        self.next_mirror += 1;
        self.write_line(&AttachLine {
            attach: &series.name,
            mirror: handle.mirror,
            axis: &series.axis,
            group: series.group.as_deref(),
            title: series.display_title(),
            color: series.color.as_deref(),
        })?;
        Ok(handle)
    }

    fn apply(&mut self, handle: &StreamHandle, op: &SyncOp) -> Result<()> {
        self.write_line(&OpLine {
            series: &handle.series,
            mirror: handle.mirror,
            op,
        })
    }

    fn axis_ranges(&mut self, ranges: &BTreeMap<String, AxisRange>) -> Result<()> {
        if self.emit_axes && !ranges.is_empty() {
            self.write_line(&AxesLine { axes: ranges })?;
        }
        self.writer.flush().map_err(EgressError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_round_trip_ops() {
        let mut egress = JsonLinesEgress::new(Vec::new());
        let handle = egress
            .attach(&SeriesConfig::new("grid.power", "watts").title("Grid"))
            .unwrap();
        egress
            .apply(&handle, &SyncOp::DropFromFront { count: 3 })
            .unwrap();
        let mut ranges = BTreeMap::new();
        ranges.insert("watts".to_string(), AxisRange { min: 1.0, max: 2.0 });
        egress.axis_ranges(&ranges).unwrap();

        let out = String::from_utf8(egress.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            r#"{"attach":"grid.power","mirror":0,"axis":"watts","title":"Grid"}"#
        );
        assert_eq!(
            lines[1],
            r#"{"series":"grid.power","mirror":0,"op":"drop_from_front","count":3}"#
        );

        let value: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        let op: SyncOp = serde_json::from_value(value).unwrap();
        assert_eq!(op, SyncOp::DropFromFront { count: 3 });

        assert_eq!(lines[2], r#"{"axes":{"watts":{"min":1.0,"max":2.0}}}"#);
    }

    #[test]
    fn test_axes_can_be_disabled() {
        let mut egress = JsonLinesEgress::new(Vec::new()).with_axes(false);
        let mut ranges = BTreeMap::new();
        ranges.insert("v".to_string(), AxisRange { min: 0.0, max: 1.0 });
        egress.axis_ranges(&ranges).unwrap();
        assert!(egress.into_inner().is_empty());
    }
}
