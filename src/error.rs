use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PackageError {
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error in {part}: {message}")]
    Xml { part: String, message: String },

    #[error("Missing package part: {0}")]
    MissingPart(String),

    #[error("Invalid package content: {0}")]
    Invalid(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PackageError {
    pub(crate) fn xml(part: &str, err: impl std::fmt::Display) -> Self {
        PackageError::Xml {
            part: part.to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum HostError {
    #[error(transparent)]
    Package(#[from] PackageError),

    #[error("Sheet not found: {0}")]
    UnknownSheet(String),

    #[error("Shape {id} not found on sheet {sheet}")]
    UnknownShape { sheet: String, id: u32 },

    #[error("Shape {0} is not a picture")]
    NotAPicture(u32),

    #[error("Sheet {0} has no drawing part")]
    NoDrawing(String),

    #[error("Unsupported picture file: {}", .0.display())]
    UnsupportedPicture(PathBuf),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Session is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image has zero size")]
    EmptyImage,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Failed to access {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to create temporary workspace: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("Output {} would overwrite the input", .0.display())]
    SameFile(PathBuf),

    #[error("Spreadsheet host error: {0}")]
    Host(#[from] HostError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl CompressError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CompressError::Io {
            path: path.into(),
            source,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid size specification: {0}")]
    InvalidSize(String),

    #[error("Target ratio must be in (0, 1], got {0}")]
    InvalidRatio(f64),

    #[error("Maximum image dimensions must be non-zero")]
    InvalidDimensions,

    #[error("At least one attempt is required")]
    InvalidAttempts,
}
