use clap::Parser;
use std::path::PathBuf;

use crate::config::defaults::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH, DEFAULT_TARGET_RATIO,
};
use crate::extract::ExtractorChoice;

#[derive(Parser, Debug)]
#[command(name = "xlsx-shrink")]
#[command(
    author,
    version,
    about = "Shrink Excel workbooks by recompressing their embedded pictures"
)]
pub struct Args {
    /// Input .xlsx file path
    #[arg(required = true)]
    pub input: PathBuf,

    /// Output file path (defaults to compressed_<input name> next to the input)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Desired output size as a fraction of the input size, in (0, 1]
    #[arg(short = 'r', long, default_value_t = DEFAULT_TARGET_RATIO)]
    pub target_ratio: f64,

    /// Per-picture size limit (e.g. "300KB", "1.5 MB", "4096")
    #[arg(short = 's', long)]
    pub max_image_size: Option<String>,

    /// Maximum picture width in pixels
    #[arg(long, default_value_t = DEFAULT_MAX_WIDTH)]
    pub max_width: u32,

    /// Maximum picture height in pixels
    #[arg(long, default_value_t = DEFAULT_MAX_HEIGHT)]
    pub max_height: u32,

    /// Maximum number of compression passes
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    /// Picture extraction strategy
    #[arg(short = 'e', long, value_enum, default_value = "auto")]
    pub extractor: ExtractorChoice,

    /// Directory for temporary files (defaults to the system temp dir)
    #[arg(long)]
    pub temp_dir: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl Args {
    /// Get the output path, defaulting to `compressed_<name>` beside the input
    pub fn output_path(&self) -> PathBuf {
        if let Some(ref output) = self.output {
            return output.clone();
        }
        let name = self
            .input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workbook.xlsx".to_string());
        self.input.with_file_name(format!("compressed_{}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["xlsx-shrink", "report.xlsx"]);
        assert_eq!(args.target_ratio, 0.5);
        assert_eq!(args.max_image_size, None);
        assert_eq!((args.max_width, args.max_height), (800, 600));
        assert_eq!(args.max_attempts, 5);
        assert_eq!(args.extractor, ExtractorChoice::Auto);
        assert_eq!(args.verbose, 0);
    }

    #[test]
    fn test_default_output_path() {
        let args = Args::parse_from(["xlsx-shrink", "data/report.xlsx"]);
        assert_eq!(
            args.output_path(),
            PathBuf::from("data").join("compressed_report.xlsx")
        );
    }

    #[test]
    fn test_explicit_options() {
        let args = Args::parse_from([
            "xlsx-shrink",
            "report.xlsx",
            "-o",
            "small.xlsx",
            "-r",
            "0.25",
            "-s",
            "1.5 MB",
            "-e",
            "host",
            "-vv",
        ]);
        assert_eq!(args.output_path(), PathBuf::from("small.xlsx"));
        assert_eq!(args.target_ratio, 0.25);
        assert_eq!(args.max_image_size.as_deref(), Some("1.5 MB"));
        assert_eq!(args.extractor, ExtractorChoice::Host);
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn test_rejects_unknown_extractor() {
        assert!(Args::try_parse_from(["xlsx-shrink", "report.xlsx", "-e", "com"]).is_err());
    }
}
