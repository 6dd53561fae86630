//! Humidity correction of optical particulate readings.
//!
//! Optical sensors overestimate particle mass in humid air because the
//! particles absorb water. The empirical growth model
//! `pm / (1 + a * (rh / 100)^b)` is applied separately to PM2.5 and PM10.

use crate::measurement::{Measurement, round};

pub const PM25_COEFFICIENTS: (f64, f64) = (0.48756, 8.60068);

pub const PM10_COEFFICIENTS: (f64, f64) = (0.81559, 5.83411);

pub fn corrected_pm(pm: f32, humidity: f32, a: f64, b: f64) -> f32 {
    (pm as f64 / (1.0 + a * (humidity as f64 / 100.0).powf(b))) as f32
}

/// Corrects PM values in place. Leaves the measurement untouched without a humidity reading.
pub fn correct_pm(m: &mut Measurement) {
    let Some(humidity) = m.humidity else {
        return;
    };

    if let Some(pm25) = m.pm25.as_mut() {
        let (a, b) = PM25_COEFFICIENTS;
        *pm25 = round(corrected_pm(*pm25, humidity, a, b), 1);
    }

    if let Some(pm10) = m.pm10.as_mut() {
        let (a, b) = PM10_COEFFICIENTS;
        *pm10 = round(corrected_pm(*pm10, humidity, a, b), 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correction_never_increases_pm() {
        for (a, b) in [PM25_COEFFICIENTS, PM10_COEFFICIENTS] {
            for humidity in (0..=100).map(|h| h as f32) {
                for pm in [0.0f32, 0.5, 12.3, 150.0, 999.9] {
                    assert!(corrected_pm(pm, humidity, a, b) <= pm, "pm={pm} rh={humidity}");
                }
            }
        }
    }

    #[test]
    fn dry_air_is_identity() {
        let (a, b) = PM25_COEFFICIENTS;
        assert_eq!(corrected_pm(42.7, 0.0, a, b), 42.7);
    }

    #[test]
    fn saturated_air_divides_by_growth_factor() {
        let (a, b) = PM10_COEFFICIENTS;
        let corrected = corrected_pm(100.0, 100.0, a, b);
        assert!((corrected - (100.0 / 1.81559) as f32).abs() < 1e-3);
    }

    #[test]
    fn corrects_and_rounds_both_pm_fields() {
        let mut m = Measurement {
            humidity: Some(90.0),
            pm25: Some(20.0),
            pm10: Some(30.0),
            ..Default::default()
        };

        correct_pm(&mut m);

        // 20 / (1 + 0.48756 * 0.9^8.60068) and 30 / (1 + 0.81559 * 0.9^5.83411)
        assert_eq!(m.pm25, Some(16.7));
        assert_eq!(m.pm10, Some(20.8));
        assert_eq!(m.humidity, Some(90.0));
    }

    #[test]
    fn missing_humidity_leaves_pm_untouched() {
        let mut m = Measurement {
            pm25: Some(20.04),
            pm10: Some(30.06),
            ..Default::default()
        };
        let before = m.clone();

        correct_pm(&mut m);

        assert_eq!(m, before);
    }
}
