use std::path::Path;

use uuid::Uuid;

use crate::error::HostError;
use crate::host::{Host, Session};
use crate::model::{ImageDescriptor, Placement};

use super::ImageExtractor;

/// Exports pictures through a host session, recording absolute positions
pub struct HostExtractor<'a> {
    host: &'a dyn Host,
}

impl<'a> HostExtractor<'a> {
    pub fn new(host: &'a dyn Host) -> Self {
        Self { host }
    }
}

impl ImageExtractor for HostExtractor<'_> {
    fn name(&self) -> &str {
        "host"
    }

    fn extract(&self, input: &Path, out_dir: &Path) -> Result<Vec<ImageDescriptor>, HostError> {
        let mut session = Session::open(self.host, input)?;
        let mut images = Vec::new();

        for sheet in session.sheet_names() {
            let shapes = match session.shapes(&sheet) {
                Ok(shapes) => shapes,
                Err(e) => {
                    log::warn!("Skipping sheet '{}': {}", sheet, e);
                    continue;
                }
            };

            for shape in shapes.iter().filter(|s| s.is_picture()) {
                let dest = out_dir.join(format!("excel_img_{}.png", Uuid::new_v4()));
                if let Err(e) = session.export_picture(&sheet, shape.id, &dest) {
                    log::warn!("Skipping '{}' on sheet '{}': {}", shape.name, sheet, e);
                    continue;
                }
                log::debug!("Exported '{}' from '{}' to {}", shape.name, sheet, dest.display());
                images.push(ImageDescriptor {
                    path: dest,
                    sheet: sheet.clone(),
                    placement: Placement::Absolute {
                        left: shape.left,
                        top: shape.top,
                    },
                    size: shape.size(),
                });
            }
        }

        Ok(images)
    }
}
