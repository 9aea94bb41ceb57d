//! Column and row extents of a worksheet, used to turn cell anchors into
//! absolute positions and back.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::PackageError;
use crate::model::CellAnchor;

/// Maximum digit width of the default font (Calibri 11) in pixels
const MAX_DIGIT_WIDTH: f64 = 7.0;

const POINTS_PER_PIXEL: f64 = 0.75;

const DEFAULT_ROW_HEIGHT: f64 = 15.0;

/// 64 px, the width Excel gives a column of an untouched sheet
const DEFAULT_COLUMN_WIDTH: f64 = 48.0;

const MAX_COLUMNS: u32 = 16_384;
const MAX_ROWS: u32 = 1_048_576;

/// Convert a stored column width (in characters) to points
fn column_width_points(chars: f64) -> f64 {
    let padding = (128.0 / MAX_DIGIT_WIDTH).trunc();
    let pixels = (((256.0 * chars + padding) / 256.0) * MAX_DIGIT_WIDTH).trunc();
    pixels * POINTS_PER_PIXEL
}

/// Default column width derived from `baseColWidth`: base characters plus
/// 5 px of padding, rounded up to a multiple of 8 px
fn base_column_width_points(base_chars: f64) -> f64 {
    let pixels = ((base_chars * MAX_DIGIT_WIDTH + 5.0) / 8.0).ceil() * 8.0;
    pixels * POINTS_PER_PIXEL
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ColumnRange {
    /// Zero-based, inclusive
    first: u32,
    last: u32,
    width: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SheetMetrics {
    default_column_width: f64,
    default_row_height: f64,
    columns: Vec<ColumnRange>,
    /// Zero-based row index to height in points
    rows: BTreeMap<u32, f64>,
}

impl Default for SheetMetrics {
    fn default() -> Self {
        Self {
            default_column_width: DEFAULT_COLUMN_WIDTH,
            default_row_height: DEFAULT_ROW_HEIGHT,
            columns: Vec::new(),
            rows: BTreeMap::new(),
        }
    }
}

fn attr_value(e: &BytesStart<'_>, name: &[u8], part: &str) -> Result<Option<String>, PackageError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| PackageError::xml(part, err))?;
        if attr.key.as_ref() == name {
            let value = attr
                .unescape_value()
                .map_err(|err| PackageError::xml(part, err))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn attr_f64(e: &BytesStart<'_>, name: &[u8], part: &str) -> Result<Option<f64>, PackageError> {
    Ok(attr_value(e, name, part)?.and_then(|v| v.trim().parse().ok()))
}

fn attr_flag(e: &BytesStart<'_>, name: &[u8], part: &str) -> Result<bool, PackageError> {
    Ok(matches!(
        attr_value(e, name, part)?.as_deref(),
        Some("1") | Some("true")
    ))
}

impl SheetMetrics {
    /// Read `sheetFormatPr`, `cols` and row heights from worksheet XML
    pub fn parse(xml: &[u8], part: &str) -> Result<Self, PackageError> {
        let mut metrics = Self::default();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                    match e.local_name().as_ref() {
                        b"sheetFormatPr" => {
                            if let Some(height) = attr_f64(e, b"defaultRowHeight", part)? {
                                metrics.default_row_height = height;
                            }
                            if let Some(width) = attr_f64(e, b"defaultColWidth", part)? {
                                metrics.default_column_width = column_width_points(width);
                            } else if let Some(base) = attr_f64(e, b"baseColWidth", part)? {
                                metrics.default_column_width = base_column_width_points(base);
                            }
                        }
                        b"col" => {
                            let min = attr_f64(e, b"min", part)?.unwrap_or(1.0) as u32;
                            let max = attr_f64(e, b"max", part)?.unwrap_or(min as f64) as u32;
                            let width = if attr_flag(e, b"hidden", part)? {
                                0.0
                            } else {
                                match attr_f64(e, b"width", part)? {
                                    Some(w) => column_width_points(w),
                                    None => metrics.default_column_width,
                                }
                            };
                            if min >= 1 && max >= min {
                                metrics.columns.push(ColumnRange {
                                    first: min - 1,
                                    last: (max - 1).min(MAX_COLUMNS - 1),
                                    width,
                                });
                            }
                        }
                        b"row" => {
                            let index = attr_f64(e, b"r", part)?.map(|r| r as u32);
                            let hidden = attr_flag(e, b"hidden", part)?;
                            let height = attr_f64(e, b"ht", part)?;
                            if let Some(r) = index.filter(|r| *r >= 1) {
                                if hidden {
                                    metrics.rows.insert(r - 1, 0.0);
                                } else if let Some(ht) = height {
                                    metrics.rows.insert(r - 1, ht);
                                }
                            }
                        }
                        _ => {}
                    }
                }
                Ok(Event::End(ref e)) if e.local_name().as_ref() == b"sheetData" => break,
                Ok(Event::Eof) => break,
                Err(err) => return Err(PackageError::xml(part, err)),
                _ => {}
            }
            buf.clear();
        }

        Ok(metrics)
    }

    pub fn column_width(&self, col: u32) -> f64 {
        self.columns
            .iter()
            .find(|range| range.first <= col && col <= range.last)
            .map(|range| range.width)
            .unwrap_or(self.default_column_width)
    }

    pub fn row_height(&self, row: u32) -> f64 {
        self.rows
            .get(&row)
            .copied()
            .unwrap_or(self.default_row_height)
    }

    /// Distance from the sheet origin to the left edge of `col`
    pub fn column_left(&self, col: u32) -> f64 {
        let mut left = self.default_column_width * col as f64;
        for range in &self.columns {
            if range.first >= col {
                continue;
            }
            let covered = range.last.min(col - 1) - range.first + 1;
            left += (range.width - self.default_column_width) * covered as f64;
        }
        left
    }

    /// Distance from the sheet origin to the top edge of `row`
    pub fn row_top(&self, row: u32) -> f64 {
        let custom: f64 = self
            .rows
            .range(..row)
            .map(|(_, height)| height - self.default_row_height)
            .sum();
        self.default_row_height * row as f64 + custom
    }

    /// Top-left corner of cell (`col`, `row`)
    pub fn cell_origin(&self, col: u32, row: u32) -> (f64, f64) {
        (self.column_left(col), self.row_top(row))
    }

    /// Absolute position of a cell anchor
    pub fn position_of(&self, anchor: &CellAnchor) -> (f64, f64) {
        let (left, top) = self.cell_origin(anchor.col, anchor.row);
        (left + anchor.col_offset, top + anchor.row_offset)
    }

    /// The cell containing an absolute position, with offsets into it
    pub fn locate(&self, left: f64, top: f64) -> CellAnchor {
        let left = left.max(0.0);
        let top = top.max(0.0);

        let mut col = 0;
        let mut x = 0.0;
        while col + 1 < MAX_COLUMNS {
            let width = self.column_width(col);
            if x + width > left {
                break;
            }
            x += width;
            col += 1;
        }

        let mut row = 0;
        let mut y = 0.0;
        while row + 1 < MAX_ROWS {
            let height = self.row_height(row);
            if y + height > top {
                break;
            }
            y += height;
            row += 1;
        }

        CellAnchor::new(col, row, left - x, top - y)
    }
}
