use anyhow::{bail, Result};
use std::ops::Range;

/// Min and max of the finite values, if any
pub fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &v in values.iter().filter(|v| v.is_finite()) {
        if v < min { min = v; }
        if v > max { max = v; }
    }
    if min == f64::INFINITY { None } else { Some((min, max)) }
}

/// Widen a range by 5% on each side, or by 1.0 if it is degenerate
pub fn pad_range(min: f64, max: f64) -> (f64, f64) {
    if min == max {
        (min - 1.0, max + 1.0)
    } else {
        let padding = (max - min) * 0.05;
        (min - padding, max + padding)
    }
}

/// Padded axis range for continuous data
pub fn continuous_range(values: &[f64]) -> Result<Range<f64>> {
    let Some((min, max)) = min_max(values) else {
        bail!("Cannot build an axis with no data points");
    };
    let (lo, hi) = pad_range(min, max);
    Ok(lo..hi)
}

/// Value axis for bars and areas: always includes 0, padded away from it only
pub fn baseline_range(values: &[f64]) -> Result<Range<f64>> {
    let Some((min, max)) = min_max(values) else {
        bail!("Cannot build an axis with no data points");
    };
    let lo = min.min(0.0);
    let hi = max.max(0.0);
    if lo == hi {
        return Ok(0.0..1.0);
    }

    let padding = (hi - lo) * 0.05;
    let lo = if lo < 0.0 { lo - padding } else { lo };
    let hi = if hi > 0.0 { hi + padding } else { hi };
    Ok(lo..hi)
}

/// Category slots are centered on 0..n
pub fn categorical_range(n: usize) -> Range<f64> {
    -0.5..(n.max(1) as f64 - 0.5)
}

/// Label for a category slot coordinate, empty between slots
pub fn category_label(categories: &[String], coord: f64) -> String {
    let idx = coord.round();
    if (coord - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    categories.get(idx as usize).cloned().unwrap_or_default()
}
