pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod host;
pub mod model;
pub mod optimize;
pub mod package;
pub mod parser;
pub mod pipeline;
pub mod replace;

use std::path::Path;

pub use config::Settings;
pub use error::{CompressError, ConfigError, HostError, OptimizeError, PackageError};
pub use extract::ExtractorChoice;
pub use host::{Host, OoxmlHost};
pub use model::{AttemptReport, CompressionReport};
pub use pipeline::Compressor;

/// Compress the pictures of an `.xlsx` file without any spreadsheet
/// application installed.
///
/// This is the recommended entry point for library consumers. Pictures are
/// edited directly in the OOXML package; use [`Compressor`] with another
/// [`Host`] to drive a different backend.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use xlsx_shrink::{compress_file, Settings};
///
/// let report = compress_file(
///     Path::new("report.xlsx"),
///     Path::new("compressed_report.xlsx"),
///     Settings::default(),
/// )
/// .unwrap();
///
/// println!("{} -> {} bytes", report.original_size, report.final_size());
/// ```
pub fn compress_file(
    input: &Path,
    output: &Path,
    settings: Settings,
) -> Result<CompressionReport, CompressError> {
    Compressor::new(settings, &OoxmlHost).run(input, output)
}
