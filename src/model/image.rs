use std::fmt;
use std::path::PathBuf;

use super::geometry::{Placement, Size};

/// An extracted picture and where it came from
#[derive(Debug, Clone, PartialEq)]
pub struct ImageDescriptor {
    /// Extracted pixel data on disk
    pub path: PathBuf,
    /// Owning sheet name
    pub sheet: String,
    pub placement: Placement,
    pub size: Size,
}

impl ImageDescriptor {
    pub fn left(&self) -> f64 {
        self.placement.left()
    }

    pub fn top(&self) -> f64 {
        self.placement.top()
    }
}

/// How a recompressed picture was encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Jpeg { quality: u8 },
    Png,
}

impl Encoding {
    pub fn extension(&self) -> &'static str {
        match self {
            Encoding::Jpeg { .. } => "jpg",
            Encoding::Png => "png",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Jpeg { quality } => write!(f, "JPEG q{}", quality),
            Encoding::Png => write!(f, "PNG"),
        }
    }
}

/// An extracted picture together with its recompressed variant
#[derive(Debug, Clone, PartialEq)]
pub struct CompressedImage {
    pub image: ImageDescriptor,
    pub compressed_path: PathBuf,
    pub encoding: Encoding,
    pub original_bytes: u64,
    pub compressed_bytes: u64,
}

impl CompressedImage {
    /// Compressed size over extracted size
    pub fn ratio(&self) -> f64 {
        if self.original_bytes == 0 {
            return 1.0;
        }
        self.compressed_bytes as f64 / self.original_bytes as f64
    }
}
