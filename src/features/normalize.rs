//! Conversion of raw textual fields into typed values.
//!
//! Nothing here fails: input that cannot be understood becomes `None`,
//! except passenger count, which has an explicit default of one.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::record::{RawTrip, TripRecord};

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%:z", "%Y-%m-%d %H:%M:%S%.f%:z"];

// Naive timestamps are taken to be UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a timestamp into a UTC instant. Blank or unparseable input is
/// `None`.
pub fn normalize_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    let s = raw?.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(dt) = OFFSET_FORMATS
        .iter()
        .find_map(|fmt| DateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.with_timezone(&Utc));
    }

    if let Some(naive) = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Passenger count is always at least one: missing, unparseable, zero and
/// negative inputs all become 1. Fractional counts truncate toward zero.
pub fn normalize_passenger_count(raw: Option<&str>) -> u32 {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return 1;
    };

    let value = s.parse::<i64>().ok().or_else(|| {
        s.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(|f| f.trunc() as i64)
    });

    match value {
        Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
        _ => 1,
    }
}

/// Builds a [`TripRecord`] from a raw row. Derived fields start out missing.
pub fn normalize(raw: RawTrip) -> TripRecord {
    TripRecord {
        pickup_datetime: normalize_timestamp(raw.pickup_datetime.as_deref()),
        dropoff_datetime: normalize_timestamp(raw.dropoff_datetime.as_deref()),
        passenger_count: normalize_passenger_count(raw.passenger_count.as_deref()),
        id: raw.id.filter(|s| !s.trim().is_empty()),
        vendor_id: raw.vendor_id,
        pickup_longitude: raw.pickup_longitude,
        pickup_latitude: raw.pickup_latitude,
        dropoff_longitude: raw.dropoff_longitude,
        dropoff_latitude: raw.dropoff_latitude,
        store_and_fwd_flag: raw.store_and_fwd_flag.filter(|s| !s.trim().is_empty()),
        fare_amount: raw.fare_amount,
        trip_duration_sec: None,
        trip_distance_km: None,
        trip_speed_kmh: None,
        trip_efficiency: None,
        fare_per_km: None,
        idle_time_sec: None,
    }
}
