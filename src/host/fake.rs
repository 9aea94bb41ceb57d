//! In-memory host for exercising the pipeline without a real workbook.

use std::cell::{Ref, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::{ImageFormat, Rgb, RgbImage};

use crate::error::HostError;
use crate::model::{Placement, Size};

use super::{Host, Shape, ShapeId, ShapeKind, WorkbookSession};

pub(crate) fn picture_shape(id: ShapeId, left: f64, top: f64, width: f64, height: f64) -> Shape {
    Shape {
        id,
        name: format!("Picture {}", id),
        kind: ShapeKind::Picture,
        left,
        top,
        width,
        height,
        anchor: None,
    }
}

/// A noisy opaque PNG that JPEG shrinks well
pub(crate) fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 7 % 256) as u8,
            (y * 13 % 256) as u8,
            ((x * y) % 251) as u8,
        ])
    });
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .expect("encode sample png");
    buf.into_inner()
}

#[derive(Debug, Clone)]
pub(crate) struct FakeSheet {
    pub name: String,
    pub shapes: Vec<Shape>,
}

impl FakeSheet {
    pub fn new(name: &str, shapes: Vec<Shape>) -> Self {
        Self {
            name: name.to_string(),
            shapes,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub opens: usize,
    pub closes: usize,
    pub saves: usize,
    pub exports: usize,
    pub deleted: Vec<(String, ShapeId)>,
    pub inserted: Vec<(String, PathBuf, Placement, Size)>,
}

pub(crate) struct FakeHost {
    sheets: Vec<FakeSheet>,
    picture: Rc<Vec<u8>>,
    state: Rc<RefCell<FakeState>>,
    /// File size written by each successive save; the last one repeats
    save_sizes: Rc<RefCell<VecDeque<u64>>>,
    fail_open: bool,
}

impl FakeHost {
    pub fn new(sheets: Vec<FakeSheet>) -> Self {
        Self {
            sheets,
            picture: Rc::new(sample_png(64, 48)),
            state: Rc::new(RefCell::new(FakeState::default())),
            save_sizes: Rc::new(RefCell::new(VecDeque::new())),
            fail_open: false,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            fail_open: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn with_save_sizes(self, sizes: &[u64]) -> Self {
        *self.save_sizes.borrow_mut() = sizes.iter().copied().collect();
        self
    }

    pub fn with_picture(mut self, bytes: Vec<u8>) -> Self {
        self.picture = Rc::new(bytes);
        self
    }

    pub fn state(&self) -> Ref<'_, FakeState> {
        self.state.borrow()
    }
}

impl Host for FakeHost {
    fn name(&self) -> &str {
        "fake"
    }

    fn open(&self, path: &Path) -> Result<Box<dyn WorkbookSession>, HostError> {
        if self.fail_open {
            return Err(HostError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no spreadsheet application",
            )));
        }
        self.state.borrow_mut().opens += 1;
        Ok(Box::new(FakeSession {
            path: path.to_path_buf(),
            sheets: self.sheets.clone(),
            picture: Rc::clone(&self.picture),
            state: Rc::clone(&self.state),
            save_sizes: Rc::clone(&self.save_sizes),
            next_id: 1000,
        }))
    }
}

struct FakeSession {
    path: PathBuf,
    sheets: Vec<FakeSheet>,
    picture: Rc<Vec<u8>>,
    state: Rc<RefCell<FakeState>>,
    save_sizes: Rc<RefCell<VecDeque<u64>>>,
    next_id: ShapeId,
}

impl FakeSession {
    fn sheet_mut(&mut self, name: &str) -> Result<&mut FakeSheet, HostError> {
        self.sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| HostError::UnknownSheet(name.to_string()))
    }
}

impl WorkbookSession for FakeSession {
    fn sheet_names(&self) -> Vec<String> {
        self.sheets.iter().map(|s| s.name.clone()).collect()
    }

    fn shapes(&self, sheet: &str) -> Result<Vec<Shape>, HostError> {
        self.sheets
            .iter()
            .find(|s| s.name == sheet)
            .map(|s| s.shapes.clone())
            .ok_or_else(|| HostError::UnknownSheet(sheet.to_string()))
    }

    fn export_picture(&mut self, sheet: &str, id: ShapeId, dest: &Path) -> Result<(), HostError> {
        let found = self.sheet_mut(sheet)?.shapes.iter().any(|s| s.id == id);
        if !found {
            return Err(HostError::UnknownShape {
                sheet: sheet.to_string(),
                id,
            });
        }
        fs::write(dest, self.picture.as_slice())?;
        self.state.borrow_mut().exports += 1;
        Ok(())
    }

    fn delete_shape(&mut self, sheet: &str, id: ShapeId) -> Result<(), HostError> {
        let shapes = &mut self.sheet_mut(sheet)?.shapes;
        let index = shapes
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| HostError::UnknownShape {
                sheet: sheet.to_string(),
                id,
            })?;
        shapes.remove(index);
        self.state
            .borrow_mut()
            .deleted
            .push((sheet.to_string(), id));
        Ok(())
    }

    fn insert_picture(
        &mut self,
        sheet: &str,
        picture: &Path,
        placement: &Placement,
        size: Size,
    ) -> Result<ShapeId, HostError> {
        let id = self.next_id;
        self.next_id += 1;
        let (left, top) = (placement.left(), placement.top());
        self.sheet_mut(sheet)?
            .shapes
            .push(picture_shape(id, left, top, size.width, size.height));
        self.state.borrow_mut().inserted.push((
            sheet.to_string(),
            picture.to_path_buf(),
            *placement,
            size,
        ));
        Ok(id)
    }

    fn save(&mut self) -> Result<(), HostError> {
        let size = {
            let mut sizes = self.save_sizes.borrow_mut();
            if sizes.len() > 1 {
                sizes.pop_front()
            } else {
                sizes.front().copied()
            }
        };
        if let Some(size) = size {
            fs::write(&self.path, vec![0u8; size as usize])?;
        }
        self.state.borrow_mut().saves += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), HostError> {
        self.state.borrow_mut().closes += 1;
        Ok(())
    }
}
