//! Picture extraction.
//!
//! Each [`ImageExtractor`] writes the pictures of a workbook to a directory
//! and describes where they sit. Strategies are tried in order and the first
//! one that finds anything wins.

pub mod host;
pub mod package;

use std::path::Path;

use clap::ValueEnum;

use crate::error::HostError;
use crate::host::Host;
use crate::model::ImageDescriptor;

pub use host::HostExtractor;
pub use package::PackageExtractor;

/// Which extraction strategies to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ExtractorChoice {
    /// Host export first, package media as fallback
    #[default]
    Auto,
    /// Host export only
    Host,
    /// Package media only
    Package,
}

pub trait ImageExtractor {
    fn name(&self) -> &str;

    /// Write every picture of `input` under `out_dir`
    fn extract(&self, input: &Path, out_dir: &Path) -> Result<Vec<ImageDescriptor>, HostError>;
}

/// Strategies for `choice`, in the order they should be tried
pub fn extractors<'a>(choice: ExtractorChoice, host: &'a dyn Host) -> Vec<Box<dyn ImageExtractor + 'a>> {
    match choice {
        ExtractorChoice::Auto => vec![
            Box::new(HostExtractor::new(host)),
            Box::new(PackageExtractor),
        ],
        ExtractorChoice::Host => vec![Box::new(HostExtractor::new(host))],
        ExtractorChoice::Package => vec![Box::new(PackageExtractor)],
    }
}

/// Run `strategies` until one produces pictures.
///
/// Never fails: a strategy error is logged and the next one is tried, and an
/// empty list means nothing could be extracted.
pub fn extract_images<'a>(
    strategies: &[Box<dyn ImageExtractor + 'a>],
    input: &Path,
    out_dir: &Path,
) -> Vec<ImageDescriptor> {
    for strategy in strategies {
        match strategy.extract(input, out_dir) {
            Ok(images) if !images.is_empty() => {
                log::info!(
                    "Extracted {} pictures using {} extraction",
                    images.len(),
                    strategy.name()
                );
                return images;
            }
            Ok(_) => log::debug!("{} extraction found no pictures", strategy.name()),
            Err(e) => log::warn!("{} extraction failed: {}", strategy.name(), e),
        }
    }
    Vec::new()
}
