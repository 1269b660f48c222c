//! ---
//! vt_section: "01-core-functionality"
//! vt_subsection: "module"
//! vt_type: "source"
//! vt_scope: "code"
//! vt_description: "Numeric helpers shared by the physiological models."
//! vt_version: "v0.1.0"
//! vt_owner: "tbd"
//! ---

/// Smallest span used when normalising against a limit of zero magnitude.
const MIN_SPAN: f64 = 1e-6;

/// Tolerance absorbing binary representation error in `seconds / dt`.
const TICK_EPSILON: f64 = 1e-9;

/// Restrict `value` to `[low, high]`.
///
/// Unlike [`f64::clamp`] this never panics when the bounds are inverted; the
/// lower bound wins, matching how the models floor their inputs.
pub fn clamp(value: f64, low: f64, high: f64) -> f64 {
    low.max(high.min(value))
}

/// Divide, returning `default` when the denominator is effectively zero.
pub fn safe_div(numer: f64, denom: f64, default: f64) -> f64 {
    if denom.abs() < 1e-12 {
        return default;
    }
    numer / denom
}

/// Deviation of `value` outside `[low, high]`, scaled to `[0, 1]`.
///
/// Zero inside the band. Outside, the linear distance beyond the violated
/// limit is divided by that limit's magnitude.
pub fn normalize_deviation(value: f64, low: f64, high: f64) -> f64 {
    if (low..=high).contains(&value) {
        return 0.0;
    }
    if value < low {
        let span = low.abs().max(MIN_SPAN);
        return clamp((low - value) / span, 0.0, 1.0);
    }
    let span = high.abs().max(MIN_SPAN);
    clamp((value - high) / span, 0.0, 1.0)
}

/// Number of fixed `dt` ticks covering `seconds`, rounded up and at least one.
pub fn ticks_for(seconds: f64, dt: f64) -> usize {
    let dt = dt.max(MIN_SPAN);
    let ticks = (seconds.max(0.0) / dt - TICK_EPSILON).ceil();
    if ticks.is_finite() && ticks >= 1.0 {
        ticks as usize
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_prefers_lower_bound_when_inverted() {
        assert_eq!(clamp(5.0, 0.0, 1.0), 1.0);
        assert_eq!(clamp(-5.0, 0.0, 1.0), 0.0);
        assert_eq!(clamp(0.5, 2.0, 1.0), 2.0);
    }

    #[test]
    fn safe_div_falls_back_on_zero() {
        assert_eq!(safe_div(1.0, 0.0, 7.0), 7.0);
        assert_eq!(safe_div(1.0, 4.0, 7.0), 0.25);
    }

    #[test]
    fn deviation_is_zero_inside_band() {
        assert_eq!(normalize_deviation(30.0, 25.0, 55.0), 0.0);
        assert_eq!(normalize_deviation(25.0, 25.0, 55.0), 0.0);
    }

    #[test]
    fn deviation_scales_by_violated_limit() {
        assert!((normalize_deviation(50.0, 0.0, 40.0) - 0.25).abs() < 1e-12);
        assert!((normalize_deviation(81.0, 90.0, 100.0) - 0.1).abs() < 1e-12);
        assert_eq!(normalize_deviation(500.0, 0.0, 40.0), 1.0);
    }

    #[test]
    fn ticks_round_up_without_float_noise() {
        assert_eq!(ticks_for(600.0, 0.2), 3000);
        assert_eq!(ticks_for(5.0, 0.2), 25);
        assert_eq!(ticks_for(5.0, 0.3), 17);
        assert_eq!(ticks_for(0.0, 0.2), 1);
    }
}
