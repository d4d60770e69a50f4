//! Clap-compatible argument types for the stacking binaries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;

use crate::composite::BoundingRect;

/// Parse a crop rectangle given as `x,y,w,h`.
///
/// The rectangle is in reference (anchor frame) pixel coordinates. Width and
/// height must be positive.
///
/// # Examples
/// Valid: "0,0,512,512", "-20.5,10,300,200"
///
/// Invalid:
/// - "0,0,512" - missing height
/// - "0,0,0,10" - zero width
pub fn parse_crop(s: &str) -> Result<BoundingRect, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err("Crop must be in format 'x,y,w,h'".to_string());
    }

    let mut values = [0.0; 4];
    for ((value, part), name) in values.iter_mut().zip(&parts).zip(["x", "y", "w", "h"]) {
        *value = part
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("Invalid crop {name} value '{}'", part.trim()))?;
        if !value.is_finite() {
            return Err(format!("Crop {name} must be finite"));
        }
    }

    let [x, y, w, h] = values;
    if w <= 0.0 || h <= 0.0 {
        return Err("Crop width and height must be positive".to_string());
    }

    Ok(BoundingRect::new(x, y, w, h))
}

/// Parse a UTC date (`YYYY-MM-DD`, midnight) or date-time
/// (`YYYY-MM-DD HH:MM:SS`).
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>, String> {
    let s = s.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
        format!("Invalid date/time '{s}': expected 'YYYY-MM-DD' or 'YYYY-MM-DD HH:MM:SS'")
    })?;
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| format!("Invalid date '{s}'"))
}

/// Compile an exposure filter. The pattern may match anywhere in the
/// exposure string.
pub fn parse_exposure_filter(s: &str) -> Result<Regex, String> {
    Regex::new(s).map_err(|e| format!("Invalid exposure pattern '{s}': {e}"))
}

/// Crop rectangle argument.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CropArg(pub BoundingRect);

impl FromStr for CropArg {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_crop(s).map(CropArg)
    }
}

impl fmt::Display for CropArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let r = &self.0;
        write!(f, "{},{},{},{}", r.x, r.y, r.w, r.h)
    }
}

impl From<CropArg> for BoundingRect {
    fn from(arg: CropArg) -> Self {
        arg.0
    }
}
