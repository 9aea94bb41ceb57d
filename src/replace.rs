//! Swaps the original pictures of a workbook copy for their recompressed
//! versions.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::error::{CompressError, HostError};
use crate::host::{Host, Session, ShapeId, WorkbookSession};
use crate::model::CompressedImage;

/// Copy `original` to `output` and replace each picture in the copy.
///
/// With no images the copy is left untouched and no session is opened.
/// Pictures that cannot be matched or replaced are logged and skipped; the
/// workbook is saved either way. Returns how many pictures were replaced.
pub fn replace_images(
    host: &dyn Host,
    original: &Path,
    output: &Path,
    images: &[CompressedImage],
    tolerance: f64,
) -> Result<usize, CompressError> {
    fs::copy(original, output).map_err(|e| CompressError::io(output, e))?;
    if images.is_empty() {
        log::info!("No compressed pictures, output is a plain copy");
        return Ok(0);
    }

    let mut session = Session::open(host, output)?;
    let mut inserted = HashSet::new();
    let mut replaced = 0;

    for image in images {
        match replace_one(&mut *session, image, tolerance, &mut inserted) {
            Ok(true) => replaced += 1,
            Ok(false) => log::warn!(
                "No picture found at ({:.1}, {:.1}) on sheet '{}'",
                image.image.left(),
                image.image.top(),
                image.image.sheet
            ),
            Err(e) => log::warn!(
                "Failed to replace picture on sheet '{}': {}",
                image.image.sheet,
                e
            ),
        }
    }

    session.save()?;
    log::info!("Replaced {} of {} pictures", replaced, images.len());
    Ok(replaced)
}

fn replace_one(
    session: &mut dyn WorkbookSession,
    image: &CompressedImage,
    tolerance: f64,
    inserted: &mut HashSet<(String, ShapeId)>,
) -> Result<bool, HostError> {
    let sheet = image.image.sheet.as_str();
    let shapes = session.shapes(sheet)?;
    let Some(target) = shapes.iter().find(|s| {
        s.is_picture()
            && !inserted.contains(&(sheet.to_string(), s.id))
            && s.is_at(&image.image.placement, tolerance)
    }) else {
        return Ok(false);
    };

    session.delete_shape(sheet, target.id)?;
    let id = session.insert_picture(
        sheet,
        &image.compressed_path,
        &image.image.placement,
        image.image.size,
    )?;
    inserted.insert((sheet.to_string(), id));
    log::debug!("Replaced '{}' on sheet '{}'", target.name, sheet);
    Ok(true)
}
