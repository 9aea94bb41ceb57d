use std::path::PathBuf;

use crate::cli::Args;
use crate::extract::ExtractorChoice;
use crate::error::ConfigError;
use crate::optimize::OptimizeOptions;

use super::defaults::*;

/// Runtime settings for a compression run
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Desired output size / input size
    pub target_ratio: f64,

    // Per-image recompression
    pub max_image_bytes: u64,
    pub max_width: u32,
    pub max_height: u32,
    pub start_quality: u8,
    pub quality_step: u8,
    pub min_quality: u8,

    // Retry policy
    pub retry_threshold: f64,
    pub retry_factor: f64,
    pub max_attempts: u32,

    /// Shape position tolerance in points
    pub match_tolerance: f64,

    pub extractor: ExtractorChoice,

    /// Parent directory for temporary workspaces (system default if None)
    pub temp_root: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            target_ratio: DEFAULT_TARGET_RATIO,

            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            start_quality: DEFAULT_START_QUALITY,
            quality_step: DEFAULT_QUALITY_STEP,
            min_quality: DEFAULT_MIN_QUALITY,

            retry_threshold: DEFAULT_RETRY_THRESHOLD,
            retry_factor: DEFAULT_RETRY_FACTOR,
            max_attempts: DEFAULT_MAX_ATTEMPTS,

            match_tolerance: DEFAULT_MATCH_TOLERANCE,

            extractor: ExtractorChoice::Auto,
            temp_root: None,
        }
    }
}

impl Settings {
    /// Create settings from CLI arguments
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        let max_image_bytes = match args.max_image_size {
            Some(ref spec) => crate::parser::parse_size(spec)?,
            None => DEFAULT_MAX_IMAGE_BYTES,
        };

        let settings = Self {
            target_ratio: args.target_ratio,
            max_image_bytes,
            max_width: args.max_width,
            max_height: args.max_height,
            max_attempts: args.max_attempts,
            extractor: args.extractor,
            temp_root: args.temp_dir.clone(),
            ..Default::default()
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.target_ratio > 0.0 && self.target_ratio <= 1.0) {
            return Err(ConfigError::InvalidRatio(self.target_ratio));
        }
        if self.max_width == 0 || self.max_height == 0 {
            return Err(ConfigError::InvalidDimensions);
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidAttempts);
        }
        Ok(())
    }

    /// Image options for the given per-image ceiling
    pub fn optimize_options(&self, max_bytes: u64) -> OptimizeOptions {
        OptimizeOptions {
            max_bytes,
            max_width: self.max_width,
            max_height: self.max_height,
            start_quality: self.start_quality,
            quality_step: self.quality_step,
            min_quality: self.min_quality,
        }
    }
}
