/// Default target size ratio (output size / input size)
pub const DEFAULT_TARGET_RATIO: f64 = 0.5;

/// Default per-image byte ceiling for lossy recompression (300 KB)
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 300 * 1024;

/// Default maximum picture width in pixels
pub const DEFAULT_MAX_WIDTH: u32 = 800;

/// Default maximum picture height in pixels
pub const DEFAULT_MAX_HEIGHT: u32 = 600;

/// First JPEG quality tried
pub const DEFAULT_START_QUALITY: u8 = 70;

/// JPEG quality decrement between attempts
pub const DEFAULT_QUALITY_STEP: u8 = 10;

/// Lowest JPEG quality tried
pub const DEFAULT_MIN_QUALITY: u8 = 10;

/// Retry only when the achieved ratio is worse than this
pub const DEFAULT_RETRY_THRESHOLD: f64 = 0.8;

/// Factor applied to the target ratio and image ceiling on each retry
pub const DEFAULT_RETRY_FACTOR: f64 = 0.8;

/// Upper bound on whole-pipeline attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Position tolerance in points when matching shapes
pub const DEFAULT_MATCH_TOLERANCE: f64 = 5.0;
