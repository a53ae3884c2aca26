//! Brightness scaling between the device's native range and Home
//! Assistant's fixed 0-255 range.
//!
//! Displays report brightness on an arbitrary integer scale bounded by a
//! per-display maximum (commonly 10000). Both conversions round to the
//! nearest integer, so a full round-trip stays within one native unit.

/// Scale a native brightness value to the 0-255 range.
///
/// `raw` is clamped to `[0, native_max]`. `native_max` must be positive;
/// discovery rejects displays that report a zero maximum.
pub fn to_normalized(raw: i32, native_max: i32) -> u8 {
    debug_assert!(native_max > 0);
    let raw = raw.clamp(0, native_max);
    ((f64::from(raw) / f64::from(native_max)) * 255.0).round() as u8
}

/// Scale a 0-255 value to the device's native range.
pub fn to_native(normalized: u8, native_max: i32) -> i32 {
    debug_assert!(native_max > 0);
    ((f64::from(normalized) / 255.0) * f64::from(native_max)).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_maps_to_zero() {
        for max in [1, 255, 10000, i32::MAX] {
            assert_eq!(to_normalized(0, max), 0);
            assert_eq!(to_native(0, max), 0);
        }
    }

    #[test]
    fn test_max_maps_to_255() {
        for max in [1, 2, 100, 255, 512, 10000] {
            assert_eq!(to_normalized(max, max), 255);
            assert_eq!(to_native(255, max), max);
        }
    }

    #[test]
    fn test_midpoint() {
        // round(5000 / 10000 * 255) = round(127.5) = 128
        assert_eq!(to_normalized(5000, 10000), 128);
    }

    #[test]
    fn test_raw_clamped_to_range() {
        assert_eq!(to_normalized(-5, 100), 0);
        assert_eq!(to_normalized(200, 100), 255);
    }

    #[test]
    fn test_round_trip_within_one_unit() {
        for max in [1, 2, 3, 100, 255, 300] {
            for raw in 0..=max {
                let back = to_native(to_normalized(raw, max), max);
                assert!(
                    (back - raw).abs() <= 1,
                    "round trip {raw} -> {back} drifted (max {max})"
                );
            }
        }

        // Coarse native scales lose precision going down to 255 steps, so
        // tolerance there is half a step instead.
        let max = 10000;
        let step = max / 255 + 1;
        for raw in (0..=max).step_by(7) {
            let back = to_native(to_normalized(raw, max), max);
            assert!(
                (back - raw).abs() <= step / 2 + 1,
                "round trip {raw} -> {back} drifted (max {max})"
            );
        }
    }

    #[test]
    fn test_normalized_round_trip_exact_enough() {
        // With native_max >= 255 every normalized value survives the trip.
        for max in [255, 1000, 10000] {
            for normalized in 0..=255u8 {
                assert_eq!(to_normalized(to_native(normalized, max), max), normalized);
            }
        }
    }
}
