use std::fs;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::HostError;
use crate::model::{ImageDescriptor, Placement, Size};
use crate::package::relationships::resolve_target;
use crate::package::{Anchor, Drawing, Package, Relationships, SheetMetrics, SheetRef};

use super::ImageExtractor;

/// Copies embedded media straight out of the zip package.
///
/// Cell-anchored pictures keep their anchor cell and offsets; only
/// absolute anchors are described in points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageExtractor;

impl ImageExtractor for PackageExtractor {
    fn name(&self) -> &str {
        "package"
    }

    fn extract(&self, input: &Path, out_dir: &Path) -> Result<Vec<ImageDescriptor>, HostError> {
        let package = Package::open(input)?;
        let mut images = Vec::new();

        for sheet in package.sheets()? {
            if let Err(e) = extract_sheet(&package, &sheet, out_dir, &mut images) {
                log::warn!("Skipping sheet '{}': {}", sheet.name, e);
            }
        }

        Ok(images)
    }
}

fn extract_sheet(
    package: &Package,
    sheet: &SheetRef,
    out_dir: &Path,
    images: &mut Vec<ImageDescriptor>,
) -> Result<(), HostError> {
    let drawing_part = match package.drawing_part(&sheet.part)? {
        Some(part) if package.has_part(&part) => part,
        _ => return Ok(()),
    };
    let metrics = match package.part(&sheet.part) {
        Some(xml) => SheetMetrics::parse(xml, &sheet.part)?,
        None => SheetMetrics::default(),
    };
    let drawing = Drawing::parse(package.part_str(&drawing_part)?, &drawing_part)?;
    let rels = package.relationships(&drawing_part)?;

    for anchor in drawing.pictures() {
        match extract_picture(package, &drawing, &rels, &metrics, anchor, out_dir) {
            Ok((path, placement, size)) => {
                log::debug!("Copied picture {} from '{}' to {}", anchor.key, sheet.name, path.display());
                images.push(ImageDescriptor {
                    path,
                    sheet: sheet.name.clone(),
                    placement,
                    size,
                });
            }
            Err(e) => log::warn!("Skipping picture {} on sheet '{}': {}", anchor.key, sheet.name, e),
        }
    }
    Ok(())
}

fn extract_picture(
    package: &Package,
    drawing: &Drawing,
    rels: &Relationships,
    metrics: &SheetMetrics,
    anchor: &Anchor,
    out_dir: &Path,
) -> Result<(PathBuf, Placement, Size), HostError> {
    let rel = anchor
        .embed
        .as_deref()
        .and_then(|id| rels.get(id))
        .filter(|rel| !rel.external)
        .ok_or(HostError::NotAPicture(anchor.key))?;
    let (left, top, size) = anchor
        .bounds(metrics)
        .ok_or(HostError::NotAPicture(anchor.key))?;

    let media = resolve_target(drawing.part(), &rel.target);
    let bytes = package.require_part(&media)?;
    let extension = Path::new(&media)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_else(|| "bin".to_string());

    let placement = match anchor.cell_anchor() {
        Some(cell) => Placement::Cell(cell),
        None => Placement::Absolute { left, top },
    };

    let dest = out_dir.join(format!("excel_img_{}.{}", Uuid::new_v4(), extension));
    fs::write(&dest, bytes)?;
    Ok((dest, placement, size))
}
