use nom::{
    bytes::complete::take_while,
    character::complete::space0,
    number::complete::double,
    IResult,
};

use crate::error::ConfigError;

/// Parse the numeric part of a size: "300", "1.5"
fn magnitude(input: &str) -> IResult<&str, f64> {
    double(input)
}

/// Parse the unit suffix: "KB", "m", "MiB", or nothing
fn unit(input: &str) -> IResult<&str, &str> {
    let (input, _) = space0(input)?;
    take_while(|c: char| c.is_ascii_alphabetic())(input)
}

fn unit_multiplier(unit: &str) -> Option<u64> {
    match unit.to_ascii_lowercase().as_str() {
        "" | "b" => Some(1),
        "k" | "kb" | "kib" => Some(1024),
        "m" | "mb" | "mib" => Some(1024 * 1024),
        "g" | "gb" | "gib" => Some(1024 * 1024 * 1024),
        _ => None,
    }
}

/// Parse a human-readable byte size such as "300KB", "1.5 MB" or "4096".
///
/// Units are 1024-based and case-insensitive.
pub fn parse_size(spec: &str) -> Result<u64, ConfigError> {
    let invalid = || ConfigError::InvalidSize(spec.to_string());
    let trimmed = spec.trim();

    let (rest, value) = magnitude(trimmed).map_err(|_| invalid())?;
    let (rest, suffix) = unit(rest).map_err(|_| invalid())?;

    if !rest.trim().is_empty() || !value.is_finite() || value < 0.0 {
        return Err(invalid());
    }

    let multiplier = unit_multiplier(suffix).ok_or_else(invalid)?;
    Ok((value * multiplier as f64).round() as u64)
}
