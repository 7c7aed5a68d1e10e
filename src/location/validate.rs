//! Output validation and privacy desensitization.

use super::types::Fix;

/// Default number of decimal places kept by [`desensitize`] (~111 m).
pub const DEFAULT_PRECISION: u32 = 3;

/// Check a fix against the coordinate invariant.
///
/// Latitude must lie in [-90, 90] and longitude in [-180, 180]; NaN and
/// infinities are rejected. Network and device fixes additionally need a
/// finite accuracy greater than zero.
pub fn validate(fix: &Fix) -> bool {
    coordinates_in_range(fix.latitude, fix.longitude) && accuracy_ok(fix)
}

/// Like [`validate`], but says what was wrong.
pub fn check(fix: &Fix) -> Result<(), String> {
    if !coordinates_in_range(fix.latitude, fix.longitude) {
        return Err(format!(
            "({}, {}) outside lat [-90, 90] / lon [-180, 180]",
            fix.latitude, fix.longitude
        ));
    }
    if !accuracy_ok(fix) {
        return Err(format!("{:?} fix needs accuracy > 0, got {:?}", fix.kind, fix.accuracy));
    }
    Ok(())
}

pub fn coordinates_in_range(lat: f64, lon: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon)
}

fn accuracy_ok(fix: &Fix) -> bool {
    if !fix.kind.requires_accuracy() {
        return true;
    }
    matches!(fix.accuracy, Some(a) if a.is_finite() && a > 0.0)
}

/// Truncate latitude/longitude toward zero to `decimals` places.
pub fn desensitize(fix: &Fix, decimals: u32) -> Fix {
    Fix {
        latitude: truncate(fix.latitude, decimals),
        longitude: truncate(fix.longitude, decimals),
        ..fix.clone()
    }
}

fn truncate(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    // Already at this precision: 39.826 * 1000 may come out as 39825.999...
    if (value * factor).round() / factor == value {
        return value;
    }
    (value * factor).trunc() / factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::types::{ProviderKind, RawFix};
    use approx::assert_abs_diff_eq;

    fn fix(lat: f64, lon: f64, kind: ProviderKind, accuracy: Option<f64>) -> Fix {
        let mut raw = RawFix::new(lat, lon);
        raw.accuracy = accuracy;
        Fix::from_raw(raw, "test", kind, 0)
    }

    #[test]
    fn test_accepts_valid_ranges() {
        let lats = [-90.0, -45.5, 0.0, 21.4225, 90.0];
        let lons = [-180.0, -74.006, 0.0, 139.6503, 180.0];
        for &lat in &lats {
            for &lon in &lons {
                assert!(validate(&fix(lat, lon, ProviderKind::Network, Some(10.0))), "{lat},{lon}");
            }
        }
    }

    #[test]
    fn test_rejects_out_of_range() {
        assert!(!validate(&fix(90.0001, 0.0, ProviderKind::Ip, None)));
        assert!(!validate(&fix(-91.0, 0.0, ProviderKind::Ip, None)));
        assert!(!validate(&fix(0.0, 180.5, ProviderKind::Ip, None)));
        assert!(!validate(&fix(0.0, -181.0, ProviderKind::Ip, None)));
        assert!(!validate(&fix(f64::NAN, 0.0, ProviderKind::Ip, None)));
        assert!(!validate(&fix(0.0, f64::INFINITY, ProviderKind::Ip, None)));
    }

    #[test]
    fn test_accuracy_required_for_network_and_device() {
        assert!(!validate(&fix(1.0, 1.0, ProviderKind::Network, None)));
        assert!(!validate(&fix(1.0, 1.0, ProviderKind::Device, Some(0.0))));
        assert!(!validate(&fix(1.0, 1.0, ProviderKind::Device, Some(-3.0))));
        assert!(validate(&fix(1.0, 1.0, ProviderKind::Device, Some(3.0))));
        // IP fixes are not held to it
        assert!(validate(&fix(1.0, 1.0, ProviderKind::Ip, None)));
    }

    #[test]
    fn test_check_reports_reason() {
        let err = check(&fix(95.0, 0.0, ProviderKind::Ip, None)).unwrap_err();
        assert!(err.contains("outside"));
        let err = check(&fix(1.0, 1.0, ProviderKind::Network, None)).unwrap_err();
        assert!(err.contains("accuracy"));
    }

    #[test]
    fn test_desensitize_truncates() {
        let f = desensitize(&fix(59.329_34, 18.068_69, ProviderKind::Ip, None), 3);
        assert_abs_diff_eq!(f.latitude, 59.329, epsilon = 1e-12);
        assert_abs_diff_eq!(f.longitude, 18.068, epsilon = 1e-12);

        let f = desensitize(&fix(-33.868_82, -151.209_29, ProviderKind::Ip, None), 3);
        assert_abs_diff_eq!(f.latitude, -33.868, epsilon = 1e-12);
        assert_abs_diff_eq!(f.longitude, -151.209, epsilon = 1e-12);
    }

    #[test]
    fn test_desensitize_is_idempotent() {
        let samples = [
            (21.4225, 39.8262),
            (39.826, -74.006),
            (-0.0015, 179.9999),
            (90.0, -180.0),
            (0.1, 0.7),
        ];
        for (lat, lon) in samples {
            let once = desensitize(&fix(lat, lon, ProviderKind::Ip, None), DEFAULT_PRECISION);
            let twice = desensitize(&once, DEFAULT_PRECISION);
            assert_eq!(once, twice, "{lat},{lon}");
        }
    }

    #[test]
    fn test_desensitize_never_rounds_up() {
        let f = desensitize(&fix(59.329_999_999_6, 18.068_999_999_7, ProviderKind::Ip, None), 3);
        assert_eq!(f.latitude, 59.329);
        assert_eq!(f.longitude, 18.068);

        let f = desensitize(&fix(-12.345_999_999_9, 0.000_999_9, ProviderKind::Ip, None), 3);
        assert_eq!(f.latitude, -12.345);
        assert_eq!(f.longitude, 0.0);
    }

    #[test]
    fn test_desensitize_keeps_other_fields() {
        let mut original = fix(10.12345, 20.12345, ProviderKind::Device, Some(8.0));
        original.altitude = Some(120.5);
        let f = desensitize(&original, 3);
        assert_eq!(f.altitude, Some(120.5));
        assert_eq!(f.accuracy, Some(8.0));
        assert_eq!(f.provider, "test");
    }
}
