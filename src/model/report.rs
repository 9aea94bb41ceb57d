/// Outcome of a single pass of the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    /// One-based attempt number
    pub attempt: u32,
    pub target_ratio: f64,
    /// Per-image byte ceiling used for this attempt
    pub image_ceiling: u64,
    pub extracted: usize,
    pub compressed: usize,
    pub replaced: usize,
    pub final_size: u64,
    pub ratio: f64,
}

/// Outcome of a whole run, across all attempts
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionReport {
    pub original_size: u64,
    /// Target ratio the run started with
    pub target_ratio: f64,
    pub attempts: Vec<AttemptReport>,
}

impl CompressionReport {
    pub fn new(original_size: u64, target_ratio: f64) -> Self {
        Self {
            original_size,
            target_ratio,
            attempts: Vec::new(),
        }
    }

    /// Smallest workbook any attempt produced
    pub fn best_size(&self) -> Option<u64> {
        self.attempts.iter().map(|a| a.final_size).min()
    }

    /// Size of the kept output, which is the best attempt
    pub fn final_size(&self) -> u64 {
        self.best_size().unwrap_or(self.original_size)
    }

    pub fn ratio(&self) -> f64 {
        size_ratio(self.final_size(), self.original_size)
    }

    pub fn met_target(&self) -> bool {
        self.ratio() <= self.target_ratio
    }
}

pub(crate) fn size_ratio(size: u64, original: u64) -> f64 {
    if original == 0 {
        return 1.0;
    }
    size as f64 / original as f64
}

/// Format a byte count in megabytes
pub fn format_mb(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

/// Format a byte count in kilobytes
pub fn format_kb(bytes: u64) -> String {
    format!("{:.1}KB", bytes as f64 / 1024.0)
}
