//! Numeric conventions shared by the store, the worker and the console
//!
//! Forces live on a single canonical scale, `[FORCE_MIN, FORCE_MAX]`, both on
//! disk and in the live parameters. Documents may carry larger values (only
//! non-negativity is enforced when parsing); those are clamped when applied.

/// Smallest canonical force
pub const FORCE_MIN: f64 = 0.0;
/// Largest canonical force
pub const FORCE_MAX: f64 = 5.0;

/// Shortest allowed tick
pub const DELAY_MIN_MS: i64 = 1;
/// Longest allowed tick
pub const DELAY_MAX_MS: i64 = 50;

/// Round to one decimal (console/live editing granularity)
pub fn snap1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Round to two decimals (on-disk granularity)
pub fn snap2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Flush values too small to matter to exactly zero
pub fn zero_eps(v: f64) -> f64 {
    if v.abs() < 1e-4 {
        0.0
    } else {
        v
    }
}

/// Clamp into the canonical force range and snap to two decimals
pub fn canonical_force(v: f64) -> f64 {
    snap2(v.clamp(FORCE_MIN, FORCE_MAX))
}

/// Clamp a tick delay into `[DELAY_MIN_MS, DELAY_MAX_MS]`
pub fn clamp_delay(ms: i64) -> u32 {
    ms.clamp(DELAY_MIN_MS, DELAY_MAX_MS) as u32
}

/// Whether a delay is acceptable without clamping
pub fn delay_in_range(ms: i64) -> bool {
    (DELAY_MIN_MS..=DELAY_MAX_MS).contains(&ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_force_clamps_and_snaps() {
        assert_eq!(canonical_force(-1.0), 0.0);
        assert_eq!(canonical_force(12.0), 5.0);
        assert_eq!(canonical_force(1.234), 1.23);
        assert_eq!(canonical_force(2.5), 2.5);
    }

    #[test]
    fn test_snapping() {
        assert_eq!(snap1(1.26), 1.3);
        assert_eq!(snap2(1.256), 1.26);
        assert_eq!(zero_eps(0.00005), 0.0);
        assert_eq!(zero_eps(0.2), 0.2);
    }

    #[test]
    fn test_delay_clamping() {
        assert_eq!(clamp_delay(0), 1);
        assert_eq!(clamp_delay(-7), 1);
        assert_eq!(clamp_delay(25), 25);
        assert_eq!(clamp_delay(500), 50);
        assert!(delay_in_range(1));
        assert!(delay_in_range(50));
        assert!(!delay_in_range(51));
    }
}
