//! Frozen header layout
//!
//! With a fixed header the header cells no longer share a layout with the
//! body, so their widths are copied from the first body row and the body is
//! pushed down by the header height.

use serde::{Deserialize, Serialize};

/// Rendered sizes read back from the table after a repaint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableMeasurements {
    /// Widths of the first body row's visible cells, left to right
    pub first_row_cell_widths: Vec<f64>,
    /// Horizontal scroll offset of the scroll container
    pub scroll_left: f64,
    /// Width of the scroll container
    pub container_width: f64,
    /// Height of the header row
    pub header_height: f64,
}

/// Sizes to apply so the frozen header lines up with the body
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeaderLayout {
    pub header_cell_widths: Vec<f64>,
    /// Body width, wide enough to always show the vertical scroll bar
    pub body_width: f64,
    pub body_margin_top: f64,
}

impl HeaderLayout {
    pub fn compute(measurements: &TableMeasurements) -> Self {
        Self {
            header_cell_widths: measurements
                .first_row_cell_widths
                .iter()
                .map(|w| w.max(0.0))
                .collect(),
            body_width: measurements.scroll_left.max(0.0) + measurements.container_width.max(0.0),
            body_margin_top: measurements.header_height.max(0.0),
        }
    }
}
