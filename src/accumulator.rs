//! Sub-pixel movement accumulator
//!
//! Pointer events carry whole-pixel deltas while profiles describe fractional
//! per-tick velocities. The accumulator keeps the unconverted remainder so the
//! long-run emitted displacement matches the requested velocity exactly.

/// Integer delta produced by one step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Delta {
    pub dx: i32,
    pub dy: i32,
}

impl Delta {
    pub fn is_zero(&self) -> bool {
        self.dx == 0 && self.dy == 0
    }
}

/// Remainders on both axes; always within (-1, 1) after a step
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MovementAccumulator {
    rem_x: f64,
    rem_y: f64,
}

impl MovementAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one tick of velocity and take out the whole part.
    ///
    /// Truncates toward zero, so negative velocities behave symmetrically.
    /// Returns the delta to emit and whether it is non-zero.
    pub fn step(&mut self, fx: f64, fy: f64) -> (Delta, bool) {
        self.rem_x += fx;
        self.rem_y += fy;

        let dx = self.rem_x.trunc();
        let dy = self.rem_y.trunc();
        self.rem_x -= dx;
        self.rem_y -= dy;

        let delta = Delta {
            dx: dx as i32,
            dy: dy as i32,
        };
        (delta, !delta.is_zero())
    }

    /// Drop any sub-pixel history
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn remainder(&self) -> (f64, f64) {
        (self.rem_x, self.rem_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_fractional_velocity_emits_periodically() {
        let mut acc = MovementAccumulator::new();
        let moved: Vec<bool> = (0..4).map(|_| acc.step(0.0, 0.5).1).collect();
        assert_eq!(moved, vec![false, true, false, true]);
    }

    #[test]
    fn test_whole_velocity_emits_every_tick() {
        let mut acc = MovementAccumulator::new();
        let (delta, moved) = acc.step(-2.0, 3.0);
        assert!(moved);
        assert_eq!(delta, Delta { dx: -2, dy: 3 });
        assert_eq!(acc.remainder(), (0.0, 0.0));
    }

    #[test]
    fn test_negative_truncates_toward_zero() {
        let mut acc = MovementAccumulator::new();
        let (delta, _) = acc.step(-1.7, 0.0);
        assert_eq!(delta.dx, -1);
        let (rx, _) = acc.remainder();
        assert!((rx + 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_reset_behaves_like_fresh() {
        let mut used = MovementAccumulator::new();
        used.step(0.9, 0.9);
        used.reset();

        let mut fresh = MovementAccumulator::new();
        assert_eq!(used.step(0.3, 0.6), fresh.step(0.3, 0.6));
        assert_eq!(used.remainder(), fresh.remainder());
    }

    proptest! {
        #[test]
        fn prop_average_converges(fx in -5.0f64..5.0, fy in -5.0f64..5.0, n in 1usize..2000) {
            let mut acc = MovementAccumulator::new();
            let (mut sx, mut sy) = (0i64, 0i64);
            for _ in 0..n {
                let (d, _) = acc.step(fx, fy);
                sx += i64::from(d.dx);
                sy += i64::from(d.dy);
            }
            // Emitted total differs from the exact total by the remainder alone
            let n = n as f64;
            prop_assert!((sx as f64 - fx * n).abs() < 1.0 + 1e-6 * n);
            prop_assert!((sy as f64 - fy * n).abs() < 1.0 + 1e-6 * n);
        }

        #[test]
        fn prop_remainder_stays_below_one(fx in -5.0f64..5.0, fy in -5.0f64..5.0, n in 1usize..500) {
            let mut acc = MovementAccumulator::new();
            for _ in 0..n {
                acc.step(fx, fy);
                let (rx, ry) = acc.remainder();
                prop_assert!(rx.abs() < 1.0);
                prop_assert!(ry.abs() < 1.0);
            }
        }
    }
}
