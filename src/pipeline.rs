//! Top-level orchestration: extract, recompress, replace, measure, and
//! retry with tighter limits while the result is still too large.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::Settings;
use crate::error::CompressError;
use crate::extract::{extract_images, extractors};
use crate::host::Host;
use crate::model::report::size_ratio;
use crate::model::{format_kb, format_mb, AttemptReport, CompressedImage, CompressionReport, ImageDescriptor};
use crate::optimize::{optimize_image, OptimizeOptions};
use crate::replace::replace_images;

/// Workbook built by an attempt, inside its workspace
const CANDIDATE_NAME: &str = "workbook.xlsx";

/// Scratch directory for one attempt, removed when dropped.
///
/// Extracted pictures and the attempt's workbook go in the root,
/// recompressed pictures in `compressed/`.
pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
    compressed: PathBuf,
}

impl Workspace {
    /// Create a workspace under `root`, or the system temp dir
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("xlsx-shrink-");
        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        let root = dir.path().to_path_buf();
        let compressed = root.join("compressed");
        fs::create_dir(&compressed)?;
        Ok(Self {
            dir: Some(dir),
            root,
            compressed,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn compressed_dir(&self) -> &Path {
        &self.compressed
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(dir) = self.dir.take() {
            let path = dir.path().to_path_buf();
            if let Err(e) = dir.close() {
                log::warn!("Failed to remove temporary directory {}: {}", path.display(), e);
            }
        }
    }
}

fn file_size(path: &Path) -> Result<u64, CompressError> {
    fs::metadata(path)
        .map(|m| m.len())
        .map_err(|e| CompressError::io(path, e))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Recompress every picture, dropping the ones that fail
fn compress_all(images: &[ImageDescriptor], out_dir: &Path, options: &OptimizeOptions) -> Vec<CompressedImage> {
    let mut compressed = Vec::with_capacity(images.len());

    for image in images {
        let name = image
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let original_bytes = fs::metadata(&image.path).map(|m| m.len()).unwrap_or(0);

        match optimize_image(&image.path, &out_dir.join(format!("compressed_{}", name)), options) {
            Ok(optimized) => {
                let result = CompressedImage {
                    image: image.clone(),
                    compressed_path: optimized.path,
                    encoding: optimized.encoding,
                    original_bytes,
                    compressed_bytes: optimized.bytes,
                };
                log::info!(
                    "{}: {} -> {} ({:.1}%, {})",
                    name,
                    format_kb(original_bytes),
                    format_kb(result.compressed_bytes),
                    result.ratio() * 100.0,
                    result.encoding
                );
                compressed.push(result);
            }
            Err(e) => log::warn!("Failed to compress {}: {}", image.path.display(), e),
        }
    }

    compressed
}

/// Limits for one attempt
#[derive(Debug, Clone, Copy, PartialEq)]
struct AttemptLimits {
    number: u32,
    target_ratio: f64,
    image_ceiling: u64,
}

pub struct Compressor<'a> {
    settings: Settings,
    host: &'a dyn Host,
}

impl<'a> Compressor<'a> {
    pub fn new(settings: Settings, host: &'a dyn Host) -> Self {
        Self { settings, host }
    }

    /// Compress the pictures of `input` into `output`.
    ///
    /// Attempts run one after another. A retry happens only while the
    /// result misses the target, is worse than the retry threshold, and
    /// some pictures were actually recompressed. `output` only ever holds
    /// the smallest workbook produced so far.
    pub fn run(&self, input: &Path, output: &Path) -> Result<CompressionReport, CompressError> {
        self.settings.validate()?;
        if same_file(input, output) {
            return Err(CompressError::SameFile(output.to_path_buf()));
        }

        let original_size = file_size(input)?;
        log::info!("Original size: {}", format_mb(original_size));

        let mut report = CompressionReport::new(original_size, self.settings.target_ratio);
        let mut limits = AttemptLimits {
            number: 1,
            target_ratio: self.settings.target_ratio,
            image_ceiling: self.settings.max_image_bytes,
        };

        loop {
            let previous_size = report.best_size();
            let attempt = self.attempt(&limits, input, output, original_size, previous_size)?;
            let (ratio, size, compressed) = (attempt.ratio, attempt.final_size, attempt.compressed);
            report.attempts.push(attempt);

            if ratio <= limits.target_ratio {
                break;
            }
            if compressed == 0 || ratio <= self.settings.retry_threshold {
                log::info!(
                    "Ratio {:.2} misses target {:.2}, not retrying",
                    ratio,
                    limits.target_ratio
                );
                break;
            }
            if previous_size.is_some_and(|previous| size >= previous) {
                log::info!(
                    "Attempt {} did not shrink the output, keeping {}",
                    limits.number,
                    format_mb(report.final_size())
                );
                break;
            }
            if limits.number >= self.settings.max_attempts {
                log::warn!(
                    "Giving up after {} attempts at ratio {:.2}",
                    limits.number,
                    ratio
                );
                break;
            }

            let factor = self.settings.retry_factor;
            limits = AttemptLimits {
                number: limits.number + 1,
                target_ratio: limits.target_ratio * factor,
                image_ceiling: ((limits.image_ceiling as f64 * factor) as u64).max(1),
            };
            log::info!(
                "Ratio {:.2} above {:.2}, retrying with target {:.2} and image limit {}",
                ratio,
                self.settings.retry_threshold,
                limits.target_ratio,
                format_kb(limits.image_ceiling)
            );
        }

        Ok(report)
    }

    /// Build a candidate workbook in a fresh workspace and copy it to
    /// `output` when it beats `best_size`
    fn attempt(
        &self,
        limits: &AttemptLimits,
        input: &Path,
        output: &Path,
        original_size: u64,
        best_size: Option<u64>,
    ) -> Result<AttemptReport, CompressError> {
        let workspace = Workspace::create(self.settings.temp_root.as_deref())
            .map_err(CompressError::Workspace)?;
        log::debug!(
            "Attempt {} in {}",
            limits.number,
            workspace.path().display()
        );

        let strategies = extractors(self.settings.extractor, self.host);
        let images = extract_images(&strategies, input, workspace.path());
        log::info!("Found {} pictures", images.len());

        let options = self.settings.optimize_options(limits.image_ceiling);
        let compressed = compress_all(&images, workspace.compressed_dir(), &options);

        let candidate = workspace.path().join(CANDIDATE_NAME);
        let replaced = match replace_images(
            self.host,
            input,
            &candidate,
            &compressed,
            self.settings.match_tolerance,
        ) {
            Ok(count) => count,
            Err(CompressError::Host(e)) => {
                log::error!("Failed to replace pictures: {}", e);
                0
            }
            Err(e) => return Err(e),
        };

        let final_size = file_size(&candidate)?;
        let ratio = size_ratio(final_size, original_size);
        log::info!(
            "Compressed size: {} ({:.1}% of original)",
            format_mb(final_size),
            ratio * 100.0
        );
        if best_size.map_or(true, |best| final_size < best) {
            fs::copy(&candidate, output).map_err(|e| CompressError::io(output, e))?;
        }

        Ok(AttemptReport {
            attempt: limits.number,
            target_ratio: limits.target_ratio,
            image_ceiling: limits.image_ceiling,
            extracted: images.len(),
            compressed: compressed.len(),
            replaced,
            final_size,
            ratio,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ExtractorChoice;
    use crate::host::fake::{picture_shape, FakeHost, FakeSheet};

    const INPUT_SIZE: u64 = 1_000_000;

    struct Fixture {
        _dir: tempfile::TempDir,
        input: PathBuf,
        output: PathBuf,
        temp_root: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("book.xlsx");
        fs::write(&input, vec![0u8; INPUT_SIZE as usize]).unwrap();
        let temp_root = dir.path().join("tmp");
        fs::create_dir(&temp_root).unwrap();
        Fixture {
            output: dir.path().join("compressed_book.xlsx"),
            input,
            temp_root,
            _dir: dir,
        }
    }

    fn settings(fixture: &Fixture) -> Settings {
        Settings {
            extractor: ExtractorChoice::Host,
            temp_root: Some(fixture.temp_root.clone()),
            ..Default::default()
        }
    }

    fn host_with_picture() -> FakeHost {
        FakeHost::new(vec![FakeSheet::new(
            "Sheet1",
            vec![picture_shape(1, 10.0, 20.0, 64.0, 48.0)],
        )])
    }

    fn is_empty_dir(path: &Path) -> bool {
        fs::read_dir(path).unwrap().next().is_none()
    }

    #[test]
    fn test_target_met_runs_once() {
        let fx = fixture();
        let host = host_with_picture().with_save_sizes(&[400_000]);
        let report = Compressor::new(settings(&fx), &host)
            .run(&fx.input, &fx.output)
            .unwrap();

        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.final_size(), 400_000);
        assert!(report.met_target());
        let attempt = &report.attempts[0];
        assert_eq!((attempt.extracted, attempt.compressed, attempt.replaced), (1, 1, 1));
        assert_eq!(host.state().saves, 1);
        assert_eq!(host.state().opens, host.state().closes);
    }

    #[test]
    fn test_ratio_below_threshold_does_not_retry() {
        let fx = fixture();
        let host = host_with_picture().with_save_sizes(&[600_000]);
        let report = Compressor::new(settings(&fx), &host)
            .run(&fx.input, &fx.output)
            .unwrap();
        assert_eq!(report.attempts.len(), 1);
        assert!(!report.met_target());
    }

    #[test]
    fn test_poor_ratio_retries_with_tighter_limits() {
        let fx = fixture();
        let host = host_with_picture().with_save_sizes(&[900_000, 300_000]);
        let report = Compressor::new(settings(&fx), &host)
            .run(&fx.input, &fx.output)
            .unwrap();

        assert_eq!(report.attempts.len(), 2);
        let retry = &report.attempts[1];
        assert_eq!(retry.attempt, 2);
        assert!((retry.target_ratio - 0.4).abs() < 1e-9);
        assert_eq!(retry.image_ceiling, (300.0 * 1024.0 * 0.8) as u64);
        assert_eq!(report.final_size(), 300_000);
        assert_eq!(fs::metadata(&fx.output).unwrap().len(), 300_000);
    }

    #[test]
    fn test_attempts_are_bounded() {
        let fx = fixture();
        let host = host_with_picture()
            .with_save_sizes(&[990_000, 980_000, 970_000, 960_000, 950_000, 940_000]);
        let report = Compressor::new(settings(&fx), &host)
            .run(&fx.input, &fx.output)
            .unwrap();

        assert_eq!(report.attempts.len(), 5);
        assert_eq!(report.final_size(), 950_000);
        assert_eq!(host.state().saves, 5);
    }

    #[test]
    fn test_stops_when_attempt_does_not_improve() {
        let fx = fixture();
        let host = host_with_picture().with_save_sizes(&[900_000, 900_000]);
        let report = Compressor::new(settings(&fx), &host)
            .run(&fx.input, &fx.output)
            .unwrap();
        assert_eq!(report.attempts.len(), 2);
        assert_eq!(fs::metadata(&fx.output).unwrap().len(), 900_000);
    }

    #[test]
    fn test_worse_retry_keeps_better_output() {
        let fx = fixture();
        let host = host_with_picture().with_save_sizes(&[850_000, 950_000]);
        let report = Compressor::new(settings(&fx), &host)
            .run(&fx.input, &fx.output)
            .unwrap();

        assert_eq!(report.attempts.len(), 2);
        assert_eq!(report.attempts[1].final_size, 950_000);
        assert_eq!(report.final_size(), 850_000);
        assert_eq!(fs::metadata(&fx.output).unwrap().len(), 850_000);
        assert!(is_empty_dir(&fx.temp_root));
    }

    #[test]
    fn test_no_pictures_copies_input() {
        let fx = fixture();
        let host = FakeHost::new(vec![FakeSheet::new("Sheet1", vec![])]);
        let report = Compressor::new(settings(&fx), &host)
            .run(&fx.input, &fx.output)
            .unwrap();

        assert_eq!(report.attempts.len(), 1);
        assert_eq!(report.final_size(), INPUT_SIZE);
        assert_eq!(fs::metadata(&fx.output).unwrap().len(), INPUT_SIZE);
        assert_eq!(host.state().saves, 0);
    }

    #[test]
    fn test_workspace_removed_after_success() {
        let fx = fixture();
        let host = host_with_picture().with_save_sizes(&[900_000, 800_000, 700_000]);
        Compressor::new(settings(&fx), &host)
            .run(&fx.input, &fx.output)
            .unwrap();
        assert!(is_empty_dir(&fx.temp_root));
    }

    #[test]
    fn test_workspace_removed_after_error() {
        let fx = fixture();
        let host = host_with_picture();
        let output = fx.temp_root.join("missing").join("out.xlsx");
        let result = Compressor::new(settings(&fx), &host).run(&fx.input, &output);

        assert!(matches!(result, Err(CompressError::Io { .. })));
        assert!(is_empty_dir(&fx.temp_root));
    }

    #[test]
    fn test_missing_input_is_an_error() {
        let fx = fixture();
        let host = host_with_picture();
        let result = Compressor::new(settings(&fx), &host)
            .run(&fx.temp_root.join("nope.xlsx"), &fx.output);
        assert!(matches!(result, Err(CompressError::Io { .. })));
    }

    #[test]
    fn test_refuses_to_overwrite_input() {
        let fx = fixture();
        let host = host_with_picture();
        let result = Compressor::new(settings(&fx), &host).run(&fx.input, &fx.input);
        assert!(matches!(result, Err(CompressError::SameFile(_))));
    }

    #[test]
    fn test_invalid_settings_are_rejected() {
        let fx = fixture();
        let host = host_with_picture();
        let bad = Settings {
            target_ratio: 0.0,
            ..settings(&fx)
        };
        let result = Compressor::new(bad, &host).run(&fx.input, &fx.output);
        assert!(matches!(result, Err(CompressError::Config(_))));
    }

    #[test]
    fn test_unavailable_host_falls_back_to_package_media() {
        let dir = tempfile::tempdir().unwrap();
        let input = crate::package::fixture::write_workbook(dir.path());
        let output = dir.path().join("compressed_report.xlsx");
        let host = FakeHost::unavailable();
        let settings = Settings {
            extractor: ExtractorChoice::Auto,
            ..Default::default()
        };

        let report = Compressor::new(settings, &host).run(&input, &output).unwrap();
        let attempt = &report.attempts[0];
        assert_eq!(attempt.extracted, 2);
        assert_eq!(attempt.compressed, 2);
        assert_eq!(attempt.replaced, 0);
        assert_eq!(report.final_size(), fs::metadata(&input).unwrap().len());
    }

    #[test]
    fn test_workspace_layout() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let workspace = Workspace::create(Some(root.path())).unwrap();
            assert!(workspace.compressed_dir().is_dir());
            assert!(workspace.compressed_dir().starts_with(workspace.path()));
            workspace.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
