//! Chi-square per degree of freedom cut selection

use serde::Serialize;

/// Ideal-coordinate fit with delta-G-phi corrections
pub const CHI2_CUT_DELTA_GPHIS: f64 = 50.0;
/// Ideal-coordinate fit without corrections
pub const CHI2_CUT_IDEAL: f64 = 2.0;
/// Nominal fit
pub const CHI2_CUT_NOMINAL: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Chi2Cuts {
    /// Acceptance cut applied by the monitoring stage
    pub monitor: f64,
    /// Floor applied by first-stage overlap removal, if any
    pub overlap_removal_min: Option<f64>,
}

/// Select the cuts from the fit type, the delta-G-phi flag and whether the
/// Hough road finder is active.
///
/// Any non-zero `ideal_coord_fit_type` counts as an ideal-coordinate fit.
pub fn select_chi2_cuts(ideal_coord_fit_type: i64, do_delta_gphis: bool, hough_active: bool) -> Chi2Cuts {
    let ideal = ideal_coord_fit_type != 0;
    let monitor = match (ideal, do_delta_gphis) {
        (true, true) => CHI2_CUT_DELTA_GPHIS,
        (true, false) => CHI2_CUT_IDEAL,
        (false, _) => CHI2_CUT_NOMINAL,
    };
    let overlap_removal_min = if ideal && do_delta_gphis {
        Some(CHI2_CUT_DELTA_GPHIS)
    } else if hough_active {
        Some(monitor)
    } else {
        None
    };
    Chi2Cuts {
        monitor,
        overlap_removal_min,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_three_way_cut() {
        assert_eq!(select_chi2_cuts(2, true, false).monitor, 50.0);
        assert_eq!(select_chi2_cuts(2, false, false).monitor, 2.0);
        assert_eq!(select_chi2_cuts(0, false, false).monitor, 40.0);
        assert_eq!(select_chi2_cuts(0, true, false).monitor, 40.0);
    }

    #[test]
    fn test_overlap_removal_floor() {
        assert_eq!(select_chi2_cuts(1, true, false).overlap_removal_min, Some(50.0));
        assert_eq!(select_chi2_cuts(1, false, true).overlap_removal_min, Some(2.0));
        assert_eq!(select_chi2_cuts(0, false, true).overlap_removal_min, Some(40.0));
        assert_eq!(select_chi2_cuts(0, true, false).overlap_removal_min, None);
    }

    proptest! {
        #[test]
        fn prop_nominal_fit_ignores_delta_gphis(delta in any::<bool>(), hough in any::<bool>()) {
            prop_assert_eq!(select_chi2_cuts(0, delta, hough).monitor, CHI2_CUT_NOMINAL);
        }
    }
}
