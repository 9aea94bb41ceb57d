//! Native host: edits picture shapes directly in the OOXML package.

use std::fs;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::error::HostError;
use crate::model::{points_to_emu, CellAnchor, Placement, Size};
use crate::package::content_types::image_content_type;
use crate::package::relationships::{relative_target, resolve_target, RT_IMAGE};
use crate::package::{
    AnchorKind, Drawing, Marker, Package, PictureAnchor, PictureLayout, Relationships, SheetMetrics,
    SheetRef,
};

use super::{Host, Shape, ShapeId, ShapeKind, WorkbookSession};

/// Opens `.xlsx` files without any spreadsheet application installed
#[derive(Debug, Clone, Copy, Default)]
pub struct OoxmlHost;

impl Host for OoxmlHost {
    fn name(&self) -> &str {
        "ooxml"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn WorkbookSession>, HostError> {
        Ok(Box::new(OoxmlSession::open(path)?))
    }
}

struct DrawingState {
    drawing: Drawing,
    rels: Relationships,
    dirty: bool,
}

/// Layout of a deleted picture, reused by a picture inserted at the same spot
struct Vacated {
    left: f64,
    top: f64,
    kind: AnchorKind,
    edit_as: Option<String>,
}

/// Positions closer than this (points) count as the same spot
const VACATED_TOLERANCE: f64 = 0.5;

struct SheetState {
    sheet: SheetRef,
    metrics: SheetMetrics,
    drawing: Option<DrawingState>,
    vacated: Vec<Vacated>,
}

pub struct OoxmlSession {
    path: PathBuf,
    /// `None` once closed
    package: Option<Package>,
    sheets: Vec<SheetState>,
}

impl OoxmlSession {
    pub fn open(path: &Path) -> Result<Self, HostError> {
        let package = Package::open(path)?;
        let mut sheets = Vec::new();

        for sheet in package.sheets()? {
            let metrics = match package.part(&sheet.part) {
                Some(xml) => SheetMetrics::parse(xml, &sheet.part)?,
                None => SheetMetrics::default(),
            };

            let drawing = match package.drawing_part(&sheet.part)? {
                Some(part) if package.has_part(&part) => {
                    let drawing = Drawing::parse(package.part_str(&part)?, &part)?;
                    let rels = package.relationships(&part)?;
                    Some(DrawingState {
                        drawing,
                        rels,
                        dirty: false,
                    })
                }
                _ => None,
            };

            sheets.push(SheetState {
                sheet,
                metrics,
                drawing,
                vacated: Vec::new(),
            });
        }

        Ok(Self {
            path: path.to_path_buf(),
            package: Some(package),
            sheets,
        })
    }
}

fn marker(cell: &CellAnchor) -> Marker {
    Marker {
        col: cell.col,
        col_off: points_to_emu(cell.col_offset),
        row: cell.row,
        row_off: points_to_emu(cell.row_offset),
    }
}

fn find_sheet<'a>(sheets: &'a [SheetState], name: &str) -> Result<&'a SheetState, HostError> {
    sheets
        .iter()
        .find(|s| s.sheet.name == name)
        .ok_or_else(|| HostError::UnknownSheet(name.to_string()))
}

fn find_sheet_mut<'a>(
    sheets: &'a mut [SheetState],
    name: &str,
) -> Result<&'a mut SheetState, HostError> {
    sheets
        .iter_mut()
        .find(|s| s.sheet.name == name)
        .ok_or_else(|| HostError::UnknownSheet(name.to_string()))
}

impl WorkbookSession for OoxmlSession {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.sheet.name.clone()).collect()
    }

    fn shapes(&self, sheet: &str) -> Result<Vec<Shape>, HostError> {
        if self.package.is_none() {
            return Err(HostError::Closed);
        }
        let state = find_sheet(&self.sheets, sheet)?;
        let Some(drawing) = &state.drawing else {
            return Ok(Vec::new());
        };

        let shapes = drawing
            .drawing
            .anchors()
            .iter()
            .filter_map(|anchor| {
                let (left, top, size) = anchor.bounds(&state.metrics)?;
                Some(Shape {
                    id: anchor.key,
                    name: anchor
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("Shape {}", anchor.key)),
                    kind: if anchor.is_embedded_picture() {
                        ShapeKind::Picture
                    } else {
                        ShapeKind::Other
                    },
                    left,
                    top,
                    width: size.width,
                    height: size.height,
                    anchor: anchor.cell_anchor(),
                })
            })
            .collect();
        Ok(shapes)
    }

    fn export_picture(&mut self, sheet: &str, id: ShapeId, dest: &Path) -> Result<(), HostError> {
        let package = self.package.as_ref().ok_or(HostError::Closed)?;
        let state = find_sheet(&self.sheets, sheet)?;
        let drawing = state
            .drawing
            .as_ref()
            .ok_or_else(|| HostError::NoDrawing(sheet.to_string()))?;

        let anchor = drawing
            .drawing
            .anchor(id)
            .ok_or_else(|| HostError::UnknownShape {
                sheet: sheet.to_string(),
                id,
            })?;
        let rel = anchor
            .embed
            .as_deref()
            .and_then(|rel_id| drawing.rels.get(rel_id))
            .filter(|rel| !rel.external)
            .ok_or(HostError::NotAPicture(id))?;

        let media = resolve_target(drawing.drawing.part(), &rel.target);
        let bytes = package.require_part(&media)?;
        let picture = image::load_from_memory(bytes)?;
        picture.save_with_format(dest, ImageFormat::Png)?;
        Ok(())
    }

    fn delete_shape(&mut self, sheet: &str, id: ShapeId) -> Result<(), HostError> {
        if self.package.is_none() {
            return Err(HostError::Closed);
        }
        let state = find_sheet_mut(&mut self.sheets, sheet)?;
        let metrics = &state.metrics;
        let drawing = state
            .drawing
            .as_mut()
            .ok_or_else(|| HostError::NoDrawing(sheet.to_string()))?;

        let removed = drawing
            .drawing
            .remove(id)
            .ok_or_else(|| HostError::UnknownShape {
                sheet: sheet.to_string(),
                id,
            })?;

        if let Some((left, top, _)) = removed.bounds(metrics) {
            state.vacated.push(Vacated {
                left,
                top,
                kind: removed.kind,
                edit_as: removed.edit_as.clone(),
            });
        }
        if let Some(rel_id) = removed.embed {
            if !drawing.drawing.references(&rel_id) {
                drawing.rels.remove(&rel_id);
            }
        }
        drawing.dirty = true;
        Ok(())
    }

    fn insert_picture(
        &mut self,
        sheet: &str,
        picture: &Path,
        placement: &Placement,
        size: Size,
    ) -> Result<ShapeId, HostError> {
        let package = self.package.as_mut().ok_or(HostError::Closed)?;
        let state = find_sheet_mut(&mut self.sheets, sheet)?;
        let metrics = &state.metrics;
        let vacated = &mut state.vacated;
        let drawing = state
            .drawing
            .as_mut()
            .ok_or_else(|| HostError::NoDrawing(sheet.to_string()))?;

        let extension = picture
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| HostError::UnsupportedPicture(picture.to_path_buf()))?;
        let content_type = image_content_type(&extension)
            .ok_or_else(|| HostError::UnsupportedPicture(picture.to_path_buf()))?;
        let bytes = fs::read(picture)?;

        let media = package.unused_media_name(&extension);
        package.set_part(media.clone(), bytes);
        package.ensure_content_type(&extension, content_type)?;
        let rel_id = drawing
            .rels
            .add(RT_IMAGE, &relative_target(drawing.drawing.part(), &media));

        let (cell, (left, top)) = match placement {
            Placement::Absolute { left, top } => (metrics.locate(*left, *top), (*left, *top)),
            Placement::Cell(anchor) => (*anchor, metrics.position_of(anchor)),
        };

        let previous = vacated
            .iter()
            .position(|v| {
                (v.left - left).abs() < VACATED_TOLERANCE && (v.top - top).abs() < VACATED_TOLERANCE
            })
            .map(|index| vacated.swap_remove(index));
        let layout = match previous {
            Some(Vacated {
                kind: AnchorKind::TwoCell,
                edit_as,
                ..
            }) => PictureLayout::TwoCell {
                to: marker(&metrics.locate(left + size.width, top + size.height)),
                edit_as,
            },
            Some(Vacated {
                kind: AnchorKind::Absolute,
                ..
            }) => PictureLayout::Absolute,
            _ => PictureLayout::OneCell,
        };

        let shape_id = drawing.drawing.next_shape_id();
        let key = drawing.drawing.push_picture(&PictureAnchor {
            layout,
            from: marker(&cell),
            off: (points_to_emu(left), points_to_emu(top)),
            ext: (
                points_to_emu(size.width).max(1),
                points_to_emu(size.height).max(1),
            ),
            shape_id,
            name: format!("Picture {}", shape_id),
            embed: rel_id,
        })?;
        drawing.dirty = true;
        Ok(key)
    }

    fn save(&mut self) -> Result<(), HostError> {
        let package = self.package.as_mut().ok_or(HostError::Closed)?;

        for state in &mut self.sheets {
            if let Some(drawing) = state.drawing.as_mut().filter(|d| d.dirty) {
                let part = drawing.drawing.part().to_string();
                package.set_part(part.clone(), drawing.drawing.to_xml().into_bytes());
                package.set_relationships(&part, &drawing.rels);
                drawing.dirty = false;
            }
        }

        let removed = package.prune_unreferenced_media()?;
        if !removed.is_empty() {
            log::debug!("Dropped {} unreferenced media parts", removed.len());
        }

        package.save(&self.path)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), HostError> {
        self.package = None;
        self.sheets.clear();
        Ok(())
    }
}
