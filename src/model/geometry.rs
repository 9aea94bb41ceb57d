//! Layout geometry shared by extraction and replacement.
//!
//! All distances are in points (1/72 inch). Drawing parts store EMUs, which
//! are converted at the package boundary.

/// English Metric Units per point
pub const EMU_PER_POINT: f64 = 12_700.0;

pub fn emu_to_points(emu: i64) -> f64 {
    emu as f64 / EMU_PER_POINT
}

pub fn points_to_emu(points: f64) -> i64 {
    (points * EMU_PER_POINT).round() as i64
}

/// Width and height of a shape in points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// A zero-based anchor cell plus offsets into that cell, in points
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CellAnchor {
    pub col: u32,
    pub row: u32,
    pub col_offset: f64,
    pub row_offset: f64,
}

impl CellAnchor {
    pub fn new(col: u32, row: u32, col_offset: f64, row_offset: f64) -> Self {
        Self {
            col,
            row,
            col_offset,
            row_offset,
        }
    }

    /// Same anchor cell and both offsets within `tolerance` points
    pub fn approx_eq(&self, other: &CellAnchor, tolerance: f64) -> bool {
        self.col == other.col
            && self.row == other.row
            && (self.col_offset - other.col_offset).abs() < tolerance
            && (self.row_offset - other.row_offset).abs() < tolerance
    }
}

/// Where a picture sits on its sheet.
///
/// Host sessions report absolute positions; the raw package reader reports
/// cell-relative anchors. The variant keeps the two coordinate spaces apart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Placement {
    /// Offset from the top-left corner of the sheet
    Absolute { left: f64, top: f64 },
    /// Offset from the top-left corner of an anchor cell
    Cell(CellAnchor),
}

impl Placement {
    pub fn left(&self) -> f64 {
        match self {
            Placement::Absolute { left, .. } => *left,
            Placement::Cell(anchor) => anchor.col_offset,
        }
    }

    pub fn top(&self) -> f64 {
        match self {
            Placement::Absolute { top, .. } => *top,
            Placement::Cell(anchor) => anchor.row_offset,
        }
    }
}
