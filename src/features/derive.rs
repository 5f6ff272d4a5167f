//! Per-trip derived features.
//!
//! Each function re-checks its own preconditions and returns `None` when
//! they do not hold; a derived value is never zero, infinite or NaN as a
//! stand-in for "unknown".

use chrono::{DateTime, Utc};

use crate::config::PipelineConfig;
use crate::features::geo::distance_km;
use crate::record::TripRecord;

/// Seconds from pickup to dropoff. `None` if either is missing or dropoff
/// precedes pickup.
pub fn trip_duration_sec(
    pickup: Option<DateTime<Utc>>,
    dropoff: Option<DateTime<Utc>>,
) -> Option<f64> {
    let delta = dropoff? - pickup?;
    let secs = delta.num_milliseconds() as f64 / 1000.0;
    (secs >= 0.0).then_some(secs)
}

/// Average speed in km/h. Requires a strictly positive duration.
pub fn trip_speed_kmh(distance_km: Option<f64>, duration_sec: Option<f64>) -> Option<f64> {
    let distance = distance_km?;
    let duration = duration_sec.filter(|d| *d > 0.0)?;
    let speed = distance / (duration / 3600.0);
    speed.is_finite().then_some(speed)
}

/// Speed as a fraction of `max_speed_kmh`, capped at 1.0.
pub fn trip_efficiency(speed_kmh: Option<f64>, max_speed_kmh: f64) -> Option<f64> {
    let ratio = speed_kmh? / max_speed_kmh;
    // check before clamping: NaN.min(1.0) is 1.0
    (ratio.is_finite() && ratio >= 0.0).then_some(ratio.min(1.0))
}

/// Fare divided by distance. `None` for a zero or missing distance.
pub fn fare_per_km(fare_amount: Option<f64>, distance_km: Option<f64>) -> Option<f64> {
    let distance = distance_km.filter(|d| *d != 0.0)?;
    let value = fare_amount? / distance;
    value.is_finite().then_some(value)
}

/// Fills in duration, distance, speed, efficiency and fare-per-km, in that
/// order.
pub fn derive_features(record: &mut TripRecord, config: &PipelineConfig) {
    record.trip_duration_sec = trip_duration_sec(record.pickup_datetime, record.dropoff_datetime);
    record.trip_distance_km = distance_km(
        record.pickup_latitude,
        record.pickup_longitude,
        record.dropoff_latitude,
        record.dropoff_longitude,
    );
    record.trip_speed_kmh = trip_speed_kmh(record.trip_distance_km, record.trip_duration_sec);
    record.trip_efficiency = trip_efficiency(record.trip_speed_kmh, config.max_speed_kmh);
    record.fare_per_km = fare_per_km(record.fare_amount, record.trip_distance_km);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::normalize::normalize;
    use crate::record::RawTrip;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(secs: i64) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap() + chrono::Duration::seconds(secs))
    }

    #[test]
    fn test_ten_minute_ten_km_trip() {
        let duration = trip_duration_sec(at(0), at(600));
        assert_eq!(duration, Some(600.0));

        let speed = trip_speed_kmh(Some(10.0), duration);
        assert_eq!(speed, Some(60.0));

        assert_eq!(trip_efficiency(speed, 120.0), Some(0.5));
    }

    #[test]
    fn test_dropoff_before_pickup() {
        let duration = trip_duration_sec(at(600), at(0));
        assert_eq!(duration, None);

        let speed = trip_speed_kmh(Some(10.0), duration);
        assert_eq!(speed, None);
        assert_eq!(trip_efficiency(speed, 120.0), None);
    }

    #[test]
    fn test_zero_duration_has_no_speed() {
        assert_eq!(trip_duration_sec(at(5), at(5)), Some(0.0));
        assert_eq!(trip_speed_kmh(Some(1.0), Some(0.0)), None);
    }

    #[test]
    fn test_missing_timestamp_has_no_duration() {
        assert_eq!(trip_duration_sec(None, at(5)), None);
        assert_eq!(trip_duration_sec(at(5), None), None);
    }

    #[test]
    fn test_efficiency_is_capped() {
        assert_eq!(trip_efficiency(Some(150.0), 120.0), Some(1.0));
        assert_eq!(trip_efficiency(Some(0.0), 120.0), Some(0.0));
        assert_eq!(trip_efficiency(None, 120.0), None);
    }

    #[test]
    fn test_efficiency_degenerate_max_speed() {
        assert_eq!(trip_efficiency(Some(0.0), 0.0), None);
        assert_eq!(trip_efficiency(Some(50.0), 0.0), None);
        assert_eq!(trip_efficiency(Some(50.0), f64::NAN), None);
        assert_eq!(trip_efficiency(Some(f64::NAN), 120.0), None);
    }

    #[test]
    fn test_fare_per_km_zero_distance() {
        assert_eq!(fare_per_km(Some(15.0), Some(0.0)), None);
        assert_eq!(fare_per_km(Some(15.0), None), None);
        assert_eq!(fare_per_km(None, Some(3.0)), None);
        assert_eq!(fare_per_km(Some(15.0), Some(3.0)), Some(5.0));
    }

    #[test]
    fn test_derive_features_full_record() {
        let mut record = normalize(RawTrip {
            vendor_id: Some(1),
            pickup_datetime: Some("2025-01-01T00:00:00Z".into()),
            dropoff_datetime: Some("2025-01-01T00:30:00Z".into()),
            pickup_latitude: Some(0.0),
            pickup_longitude: Some(0.0),
            dropoff_latitude: Some(0.1),
            dropoff_longitude: Some(0.0),
            fare_amount: Some(22.0),
            ..Default::default()
        });
        derive_features(&mut record, &PipelineConfig::default());

        let distance = record.trip_distance_km.unwrap();
        assert!((distance - 11.119_492_66).abs() < 1e-6);
        assert_eq!(record.trip_duration_sec, Some(1800.0));
        assert!((record.trip_speed_kmh.unwrap() - distance * 2.0).abs() < 1e-9);
        assert!((record.trip_efficiency.unwrap() - distance * 2.0 / 120.0).abs() < 1e-9);
        assert!((record.fare_per_km.unwrap() - 22.0 / distance).abs() < 1e-9);
        assert_eq!(record.idle_time_sec, None);
    }

    #[test]
    fn test_derive_features_same_point_has_no_fare_per_km() {
        let mut record = normalize(RawTrip {
            pickup_datetime: Some("2025-01-01T00:00:00Z".into()),
            dropoff_datetime: Some("2025-01-01T00:05:00Z".into()),
            pickup_latitude: Some(40.7),
            pickup_longitude: Some(-73.9),
            dropoff_latitude: Some(40.7),
            dropoff_longitude: Some(-73.9),
            fare_amount: Some(15.0),
            ..Default::default()
        });
        derive_features(&mut record, &PipelineConfig::default());

        assert_eq!(record.trip_distance_km, Some(0.0));
        assert_eq!(record.fare_per_km, None);
        assert_eq!(record.trip_speed_kmh, Some(0.0));
    }

    proptest! {
        #[test]
        fn prop_duration_never_negative(a in -100_000i64..100_000, b in -100_000i64..100_000) {
            if let Some(d) = trip_duration_sec(at(a), at(b)) {
                prop_assert!(d >= 0.0);
            }
        }

        #[test]
        fn prop_efficiency_in_unit_interval(
            distance in 0.0f64..500.0,
            duration in 0.0f64..20_000.0,
            max_speed in 1.0f64..300.0,
        ) {
            let speed = trip_speed_kmh(Some(distance), Some(duration));
            if let Some(e) = trip_efficiency(speed, max_speed) {
                prop_assert!((0.0..=1.0).contains(&e));
            }
        }

        #[test]
        fn prop_fare_per_km_always_finite(fare in -100.0f64..500.0, distance in prop::option::of(0.0f64..50.0)) {
            match fare_per_km(Some(fare), distance) {
                Some(v) => prop_assert!(v.is_finite()),
                None => prop_assert!(distance.is_none() || distance == Some(0.0) || !(fare / distance.unwrap()).is_finite()),
            }
        }
    }
}
