pub mod geometry;
pub mod image;
pub mod report;

pub use geometry::{emu_to_points, points_to_emu, CellAnchor, Placement, Size, EMU_PER_POINT};
pub use image::{CompressedImage, Encoding, ImageDescriptor};
pub use report::{format_kb, format_mb, AttemptReport, CompressionReport};
