//! The spreadsheet host: whatever can open a workbook and manipulate its
//! picture shapes.
//!
//! The pipeline only talks to [`Host`] and [`WorkbookSession`], so the
//! recompression and retry logic can run against a fake host in tests.

#[cfg(test)]
pub(crate) mod fake;
pub mod ooxml;

use std::ops::{Deref, DerefMut};
use std::path::Path;

use crate::error::HostError;
use crate::model::{CellAnchor, Placement, Size};

pub use ooxml::OoxmlHost;

/// Session-local shape identifier
pub type ShapeId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Picture,
    Other,
}

/// A shape as reported by a host session, geometry in points
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    pub id: ShapeId,
    pub name: String,
    pub kind: ShapeKind,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    /// Anchor cell for shapes that move with cells
    pub anchor: Option<CellAnchor>,
}

impl Shape {
    pub fn is_picture(&self) -> bool {
        self.kind == ShapeKind::Picture
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Whether this shape sits at `placement`, within `tolerance` points
    pub fn is_at(&self, placement: &Placement, tolerance: f64) -> bool {
        match placement {
            Placement::Absolute { left, top } => {
                (self.left - left).abs() < tolerance && (self.top - top).abs() < tolerance
            }
            Placement::Cell(anchor) => self
                .anchor
                .map(|own| own.approx_eq(anchor, tolerance))
                .unwrap_or(false),
        }
    }
}

/// Opens workbooks for shape-level editing
pub trait Host {
    fn name(&self) -> &str;

    fn open(&self, path: &Path) -> Result<Box<dyn WorkbookSession>, HostError>;
}

/// An open workbook
pub trait WorkbookSession {
    fn sheet_names(&self) -> Vec<String>;

    fn shapes(&self, sheet: &str) -> Result<Vec<Shape>, HostError>;

    /// Write the picture's pixels to `dest` as a bitmap file
    fn export_picture(&mut self, sheet: &str, id: ShapeId, dest: &Path) -> Result<(), HostError>;

    fn delete_shape(&mut self, sheet: &str, id: ShapeId) -> Result<(), HostError>;

    /// Embed `picture` (not linked) at the given placement and size
    fn insert_picture(
        &mut self,
        sheet: &str,
        picture: &Path,
        placement: &Placement,
        size: Size,
    ) -> Result<ShapeId, HostError>;

    fn save(&mut self) -> Result<(), HostError>;

    /// Release the workbook; unsaved edits are discarded
    fn close(&mut self) -> Result<(), HostError>;
}

/// An open session that is closed on every exit path.
///
/// Close errors are logged, never returned, so they cannot mask the
/// outcome of the work done inside the session.
pub struct Session {
    inner: Box<dyn WorkbookSession>,
    host: String,
}

impl Session {
    pub fn open(host: &dyn Host, path: &Path) -> Result<Self, HostError> {
        let inner = host.open(path)?;
        log::debug!("Opened {} with {}", path.display(), host.name());
        Ok(Self {
            inner,
            host: host.name().to_string(),
        })
    }
}

impl Deref for Session {
    type Target = dyn WorkbookSession;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for Session {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            log::warn!("Failed to close {} session: {}", self.host, e);
        }
    }
}
