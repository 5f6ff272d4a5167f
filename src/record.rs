use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single row deserialized from a raw trip CSV.
///
/// Every column is optional and numeric cells that fail to parse load as
/// `None`, so one bad cell never fails the whole batch. Unknown columns are
/// ignored, which lets cleaned output be fed back in as input.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTrip {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub vendor_id: Option<i64>,

    #[serde(default)]
    pub pickup_datetime: Option<String>,
    #[serde(default)]
    pub dropoff_datetime: Option<String>,

    // kept textual: "-3", "2.0" and "" all have a normalisation rule
    #[serde(default)]
    pub passenger_count: Option<String>,

    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pickup_longitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub pickup_latitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub dropoff_longitude: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub dropoff_latitude: Option<f64>,

    #[serde(default)]
    pub store_and_fwd_flag: Option<String>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pub fare_amount: Option<f64>,
}

/// The working unit of the pipeline: one trip, normalised and progressively
/// enriched with derived features.
///
/// `None` means missing. Derived fields start out missing and are filled in
/// by [`crate::features::derive`] and [`crate::features::idle`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    pub id: Option<String>,
    pub vendor_id: Option<i64>,
    pub pickup_datetime: Option<DateTime<Utc>>,
    pub dropoff_datetime: Option<DateTime<Utc>>,
    pub passenger_count: u32,

    pub pickup_longitude: Option<f64>,
    pub pickup_latitude: Option<f64>,
    pub dropoff_longitude: Option<f64>,
    pub dropoff_latitude: Option<f64>,

    pub store_and_fwd_flag: Option<String>,
    pub fare_amount: Option<f64>,

    // derived
    pub trip_duration_sec: Option<f64>,
    pub trip_distance_km: Option<f64>,
    pub trip_speed_kmh: Option<f64>,
    pub trip_efficiency: Option<f64>,
    pub fare_per_km: Option<f64>,
    pub idle_time_sec: Option<f64>,
}

/// The four fields a trip must carry to survive cleaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriticalField {
    Pickup,
    Dropoff,
    Duration,
    Distance,
}

impl TripRecord {
    /// First critical field that is missing, checked in the order pickup,
    /// dropoff, duration, distance.
    pub fn missing_critical(&self) -> Option<CriticalField> {
        if self.pickup_datetime.is_none() {
            Some(CriticalField::Pickup)
        } else if self.dropoff_datetime.is_none() {
            Some(CriticalField::Dropoff)
        } else if self.trip_duration_sec.is_none() {
            Some(CriticalField::Duration)
        } else if self.trip_distance_km.is_none() {
            Some(CriticalField::Distance)
        } else {
            None
        }
    }

    pub fn is_complete(&self) -> bool {
        self.missing_critical().is_none()
    }

    /// Speed used for outlier comparison; missing counts as standing still.
    pub fn speed_or_zero(&self) -> f64 {
        self.trip_speed_kmh.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::normalize::normalize;

    fn parse_rows(data: &str) -> Vec<RawTrip> {
        let mut rdr = csv::Reader::from_reader(data.as_bytes());
        rdr.deserialize().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn test_invalid_numeric_cells_load_as_missing() {
        let rows = parse_rows(
            "vendor_id,pickup_latitude,pickup_longitude,fare_amount\n\
             abc,not-a-number,-73.98,\n",
        );

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].vendor_id, None);
        assert_eq!(rows[0].pickup_latitude, None);
        assert_eq!(rows[0].pickup_longitude, Some(-73.98));
        assert_eq!(rows[0].fare_amount, None);
    }

    #[test]
    fn test_missing_columns_default_to_none() {
        let rows = parse_rows("id,vendor_id\nid1,2\n");

        assert_eq!(rows[0].id.as_deref(), Some("id1"));
        assert_eq!(rows[0].vendor_id, Some(2));
        assert_eq!(rows[0].pickup_datetime, None);
        assert_eq!(rows[0].fare_amount, None);
    }

    #[test]
    fn test_missing_critical_order() {
        let mut record = normalize(RawTrip::default());
        assert_eq!(record.missing_critical(), Some(CriticalField::Pickup));

        record.pickup_datetime = Some(Utc::now());
        assert_eq!(record.missing_critical(), Some(CriticalField::Dropoff));

        record.dropoff_datetime = record.pickup_datetime;
        assert_eq!(record.missing_critical(), Some(CriticalField::Duration));

        record.trip_duration_sec = Some(0.0);
        assert_eq!(record.missing_critical(), Some(CriticalField::Distance));

        record.trip_distance_km = Some(0.0);
        assert!(record.is_complete());
    }

    #[test]
    fn test_speed_or_zero() {
        let mut record = normalize(RawTrip::default());
        assert_eq!(record.speed_or_zero(), 0.0);
        record.trip_speed_kmh = Some(42.5);
        assert_eq!(record.speed_or_zero(), 42.5);
    }
}
