//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Floor a f64 and clamp it to the u64 range, returning 0 for NaN and negative values.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    if value >= max {
        return u64::MAX;
    }
    cast::<f64, u64>(value.floor()).unwrap_or(u64::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(f64::MAX)
}

/// Convert usize to f64 while allowing precision loss in a single location.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(f64::MAX)
}

/// Convert an upgrade level into an exponent usable with `powi`.
#[must_use]
pub fn level_exponent(level: u32) -> i32 {
    i32::try_from(level).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_handles_non_finite_and_negative() {
        assert_eq!(floor_f64_to_u64(f64::NAN), 0);
        assert_eq!(floor_f64_to_u64(-3.5), 0);
        assert_eq!(floor_f64_to_u64(f64::INFINITY), u64::MAX);
        assert_eq!(floor_f64_to_u64(1e30), u64::MAX);
    }

    #[test]
    fn floor_truncates_fractional_points() {
        assert_eq!(floor_f64_to_u64(4.0), 4);
        assert_eq!(floor_f64_to_u64(4.999), 4);
        assert_eq!(floor_f64_to_u64(0.4), 0);
    }

    #[test]
    fn widening_conversions_are_exact_for_small_values() {
        assert!((u64_to_f64(1_000) - 1_000.0).abs() < f64::EPSILON);
        assert!((usize_to_f64(7) - 7.0).abs() < f64::EPSILON);
        assert_eq!(level_exponent(3), 3);
        assert_eq!(level_exponent(u32::MAX), i32::MAX);
    }
}
