//! Size and write-directive parsing
//!
//! Accepted forms (case-insensitive, surrounding whitespace ignored):
//! - `fill`, `full`, `free`: consume all free space on the destination volume
//! - a number with an optional fraction (`500`, `1.5`) followed by an optional unit:
//!   decimal `K`, `M`, `G`, `T`, binary `Ki`, `Mi`, `Gi`, `Ti` (each optionally
//!   followed by `B`), or `B` for raw bytes
//!
//! A bare number on the command line means decimal gigabytes.

use crate::error::{Error, Result};
use std::fmt;

const KILO: u64 = 1000;
const KIBI: u64 = 1024;

/// Unit applied by [`parse_size`] when no suffix is given (decimal giga)
pub const DEFAULT_UNIT: u64 = KILO * KILO * KILO;

/// Longest fraction accepted after the decimal point
const MAX_FRACTION_DIGITS: u32 = 18;

/// What the write phase should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteTarget {
    /// Write exactly this many bytes
    Bytes(u64),
    /// Write until the destination volume has no space left
    Fill,
}

impl fmt::Display for WriteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteTarget::Bytes(n) => write!(f, "{} bytes", n),
            WriteTarget::Fill => write!(f, "all free space"),
        }
    }
}

impl std::str::FromStr for WriteTarget {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_write_target(s)
    }
}

/// Parse a write directive: a size or one of the fill sentinels
pub fn parse_write_target(s: &str) -> Result<WriteTarget> {
    match s.trim().to_lowercase().as_str() {
        "fill" | "full" | "free" => Ok(WriteTarget::Fill),
        _ => parse_size(s).map(WriteTarget::Bytes),
    }
}

/// Parse a size string like "10G", "1.5Gi", "4096B" into bytes.
///
/// A number without a unit is taken as decimal gigabytes.
pub fn parse_size(s: &str) -> Result<u64> {
    parse_size_with_default_unit(s, DEFAULT_UNIT)
}

/// Parse a size string, applying `default_unit` when no suffix is present
pub fn parse_size_with_default_unit(s: &str, default_unit: u64) -> Result<u64> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidSize("empty string".to_string()));
    }

    let split_pos = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (num_str, suffix) = trimmed.split_at(split_pos);

    let multiplier = unit_multiplier(suffix.trim(), default_unit)
        .ok_or_else(|| Error::InvalidSize(format!("unknown unit in '{}'", trimmed)))?;

    let (int_str, frac_str) = match num_str.split_once('.') {
        Some((int, frac)) => (int, frac),
        None => (num_str, ""),
    };

    if int_str.is_empty() && frac_str.is_empty() {
        return Err(Error::InvalidSize(format!("missing number in '{}'", trimmed)));
    }
    if frac_str.contains('.') || frac_str.len() > MAX_FRACTION_DIGITS as usize {
        return Err(Error::InvalidSize(format!("malformed number in '{}'", trimmed)));
    }

    let too_large = || Error::InvalidSize(format!("'{}' is too large", trimmed));

    let int: u128 = if int_str.is_empty() {
        0
    } else {
        int_str.parse().map_err(|_| too_large())?
    };

    let mut bytes = int.checked_mul(u128::from(multiplier)).ok_or_else(too_large)?;

    if !frac_str.is_empty() {
        let frac: u128 = frac_str
            .parse()
            .map_err(|_| Error::InvalidSize(format!("malformed number in '{}'", trimmed)))?;
        let scale = 10u128.pow(frac_str.len() as u32);
        bytes = bytes
            .checked_add(frac * u128::from(multiplier) / scale)
            .ok_or_else(too_large)?;
    }

    u64::try_from(bytes).map_err(|_| too_large())
}

fn unit_multiplier(suffix: &str, default_unit: u64) -> Option<u64> {
    let multiplier = match suffix.to_lowercase().as_str() {
        "" => default_unit,
        "b" => 1,
        "k" | "kb" => KILO,
        "m" | "mb" => KILO.pow(2),
        "g" | "gb" => KILO.pow(3),
        "t" | "tb" => KILO.pow(4),
        "ki" | "kib" => KIBI,
        "mi" | "mib" => KIBI.pow(2),
        "gi" | "gib" => KIBI.pow(3),
        "ti" | "tib" => KIBI.pow(4),
        _ => return None,
    };
    Some(multiplier)
}

/// Format bytes as a human-readable decimal size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1000;
    const MB: u64 = KB * 1000;
    const GB: u64 = MB * 1000;
    const TB: u64 = GB * 1000;

    if bytes >= TB {
        format!("{:.2} TB", bytes as f64 / TB as f64)
    } else if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} kB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
