use anyhow::{Context, Result};
use clap::Parser;

use xlsx_shrink::cli::Args;
use xlsx_shrink::config::Settings;
use xlsx_shrink::model::format_mb;
use xlsx_shrink::{Compressor, OoxmlHost};

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(match args.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .init();

    let settings = Settings::from_args(&args).with_context(|| "Invalid arguments")?;
    let output_path = args.output_path();

    log::info!(
        "Compressing {} with target ratio {:.2}",
        args.input.display(),
        settings.target_ratio
    );

    let report = Compressor::new(settings, &OoxmlHost)
        .run(&args.input, &output_path)
        .with_context(|| format!("Failed to compress {}", args.input.display()))?;

    if !report.met_target() {
        log::warn!(
            "Target ratio {:.2} not reached (achieved {:.2})",
            report.target_ratio,
            report.ratio()
        );
    }

    println!(
        "Wrote {}: {} -> {} ({:.1}% of original, {} attempt{})",
        output_path.display(),
        format_mb(report.original_size),
        format_mb(report.final_size()),
        report.ratio() * 100.0,
        report.attempts.len(),
        if report.attempts.len() == 1 { "" } else { "s" }
    );

    Ok(())
}
