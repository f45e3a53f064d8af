//! Shared helpers for parsing score sheets and loading uploads.

use crate::types::UploadedFile;
use std::path::{Path, PathBuf};
use tracing::debug;

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '，', '点', '%', '％', ' '];

/// Common missing value markers in hand-maintained sheets.
pub const MISSING_MARKERS: [&str; 7] = ["-", "－", "ー", "n/a", "na", "null", "none"];

/// Map full-width ASCII variants (`０`-`９`, `．`, `－`) to their ASCII forms.
pub fn normalize_width(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '０'..='９' => char::from_u32(c as u32 - '０' as u32 + '0' as u32).unwrap_or(c),
            '．' => '.',
            '－' | '−' => '-',
            '\u{3000}' => ' ',
            _ => c,
        })
        .collect()
}

/// Clean a string for numeric parsing by removing formatting characters.
///
/// # Example
///
/// ```rust,ignore
/// use kokufuku::utils::clean_numeric_string;
///
/// assert_eq!(clean_numeric_string(" ８点 "), "8");
/// assert_eq!(clean_numeric_string("1,234"), "1234");
/// ```
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = normalize_width(s.trim());
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is a missing value marker.
pub fn is_missing_marker(s: &str) -> bool {
    let lower = s.trim().to_lowercase();
    lower.is_empty() || MISSING_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a numeric value (f64).
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    if is_missing_marker(s) {
        return None;
    }
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Coerce a cell to a non-negative score; anything unparseable becomes `0.0`.
pub fn coerce_score(s: Option<&str>) -> f64 {
    s.and_then(parse_numeric_string)
        .filter(|v| *v >= 0.0)
        .unwrap_or(0.0)
}

// =============================================================================
// Numeric Utilities
// =============================================================================

/// Round to one decimal place.
#[inline]
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round a summed score to six decimals, dropping float accumulation noise.
#[inline]
pub fn round_total(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

/// Score rate in percent, `0.0` when the denominator is not positive.
#[inline]
pub fn score_rate(score: f64, max_score: f64) -> f64 {
    if max_score > 0.0 {
        round1(score / max_score * 100.0)
    } else {
        0.0
    }
}

// =============================================================================
// Upload Utilities
// =============================================================================

/// Expand a list of paths into uploads.
///
/// Directories contribute every `*.csv` file directly inside them (sorted by
/// name); plain files are taken as-is.
pub fn collect_uploads(paths: &[PathBuf]) -> std::io::Result<Vec<UploadedFile>> {
    let mut uploads = Vec::new();
    for path in paths {
        if path.is_dir() {
            for file in csv_files_in(path)? {
                uploads.push(UploadedFile::from_path(&file)?);
            }
        } else {
            uploads.push(UploadedFile::from_path(path)?);
        }
    }
    Ok(uploads)
}

fn csv_files_in(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
        })
        .collect();
    files.sort();
    debug!("Found {} CSV files in {}", files.len(), dir.display());
    Ok(files)
}

// =============================================================================
// Tests
// =============================================================================
