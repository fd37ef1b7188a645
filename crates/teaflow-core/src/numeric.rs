//! Small numeric helpers shared by the schedule and learning code.

/// Round to the nearest integer, with .5 going toward positive infinity.
///
/// `-2.5` rounds to `-2`, unlike `f64::round`.
pub(crate) fn round_half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Clamp with the bounds first, matching how the multipliers are written.
pub(crate) fn clamp(min: f64, v: f64, max: f64) -> f64 {
    v.min(max).max(min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn half_values_round_up() {
        assert_eq!(round_half_up(1.5), 2.0);
        assert_eq!(round_half_up(-1.5), -1.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(1.8), 2.0);
        assert_eq!(round_half_up(-1.8), -2.0);
    }

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp(0.6, 2.0, 1.6), 1.6);
        assert_eq!(clamp(0.6, 0.1, 1.6), 0.6);
        assert_eq!(clamp(0.6, 1.0, 1.6), 1.0);
    }
}
