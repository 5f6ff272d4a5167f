//! Batch orchestration: normalise, derive, order, fold idle time, clean and
//! scan for outliers.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::PipelineConfig;
use crate::error::Result;
use crate::features::derive::derive_features;
use crate::features::idle::assign_idle_times;
use crate::features::normalize::normalize;
use crate::features::outliers::{OutlierCollector, SpeedOutliers};
use crate::record::{CriticalField, RawTrip, TripRecord};

/// Counts describing one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineSummary {
    pub total_rows: usize,
    pub cleaned_rows: usize,
    pub dropped_rows: usize,

    // first missing critical field of each dropped row
    pub missing_pickup: usize,
    pub missing_dropoff: usize,
    pub missing_duration: usize,
    pub missing_distance: usize,

    pub outlier_count: usize,
    pub max_speed_kmh: f64,
    pub outlier_threshold_kmh: f64,
}

impl PipelineSummary {
    fn count_dropped(&mut self, field: CriticalField) {
        self.dropped_rows += 1;
        match field {
            CriticalField::Pickup => self.missing_pickup += 1,
            CriticalField::Dropoff => self.missing_dropoff += 1,
            CriticalField::Duration => self.missing_duration += 1,
            CriticalField::Distance => self.missing_distance += 1,
        }
    }
}

/// Result of a run. Owns the cleaned records; outliers index into them, so
/// both are read-only.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    cleaned: Vec<TripRecord>,
    outliers: SpeedOutliers,
    summary: PipelineSummary,
}

impl PipelineOutput {
    pub fn cleaned(&self) -> &[TripRecord] {
        &self.cleaned
    }

    pub fn outliers(&self) -> &SpeedOutliers {
        &self.outliers
    }

    pub fn summary(&self) -> &PipelineSummary {
        &self.summary
    }

    /// Outlier records in detection order.
    pub fn outlier_records(&self) -> impl Iterator<Item = &TripRecord> {
        self.outliers.records(&self.cleaned)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Validates `config` before accepting it.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            config: config.validate()?,
        })
    }

    /// Runs the whole batch. Never fails: field problems degrade to missing
    /// values and incomplete rows are dropped.
    #[tracing::instrument(skip_all, fields(rows = raw.len()))]
    pub fn run(&self, raw: Vec<RawTrip>) -> PipelineOutput {
        let mut summary = PipelineSummary {
            total_rows: raw.len(),
            max_speed_kmh: self.config.max_speed_kmh,
            outlier_threshold_kmh: self.config.outlier_threshold_kmh,
            ..Default::default()
        };

        debug!("Normalising fields and deriving features");
        let mut records: Vec<TripRecord> = raw
            .into_iter()
            .map(|row| {
                let mut record = normalize(row);
                derive_features(&mut record, &self.config);
                record
            })
            .collect();

        debug!("Ordering by group and pickup for idle time");
        self.sort_for_idle(&mut records);
        let group_key = self.config.group_key;
        assign_idle_times(&mut records, |r| group_key.key_of(r));

        let cleaned: Vec<TripRecord> = records
            .into_iter()
            .filter(|record| match record.missing_critical() {
                Some(field) => {
                    summary.count_dropped(field);
                    false
                }
                None => true,
            })
            .collect();
        summary.cleaned_rows = cleaned.len();

        let outliers = OutlierCollector::scan(&cleaned, self.config.outlier_threshold_kmh);
        summary.outlier_count = outliers.len();

        info!(
            total = summary.total_rows,
            cleaned = summary.cleaned_rows,
            dropped = summary.dropped_rows,
            outliers = summary.outlier_count,
            "Pipeline run complete"
        );

        PipelineOutput {
            cleaned,
            outliers,
            summary,
        }
    }

    /// Stable sort by `(group, pickup)`. Trips without a pickup go last
    /// within their group; ties keep input order.
    fn sort_for_idle(&self, records: &mut [TripRecord]) {
        let group_key = self.config.group_key;
        records.sort_by_key(|r| {
            (
                group_key.key_of(r),
                r.pickup_datetime.is_none(),
                r.pickup_datetime,
            )
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GroupKey;
    use crate::error::PipelineError;

    fn row(id: &str, vendor: i64, pickup: &str, dropoff: &str) -> RawTrip {
        RawTrip {
            id: Some(id.to_string()),
            vendor_id: Some(vendor),
            pickup_datetime: Some(pickup.to_string()),
            dropoff_datetime: Some(dropoff.to_string()),
            passenger_count: Some("1".to_string()),
            pickup_latitude: Some(40.75),
            pickup_longitude: Some(-73.99),
            dropoff_latitude: Some(40.76),
            dropoff_longitude: Some(-73.98),
            store_and_fwd_flag: Some("N".to_string()),
            fare_amount: Some(10.0),
        }
    }

    fn ids<'a>(records: impl IntoIterator<Item = &'a TripRecord>) -> Vec<&'a str> {
        records
            .into_iter()
            .filter_map(|r| r.id.as_deref())
            .collect()
    }

    #[test]
    fn test_sorted_by_vendor_then_pickup() {
        let raw = vec![
            row("b2", 2, "2025-01-01T01:00:00Z", "2025-01-01T01:10:00Z"),
            row("a2", 1, "2025-01-01T02:00:00Z", "2025-01-01T02:10:00Z"),
            row("b1", 2, "2025-01-01T00:00:00Z", "2025-01-01T00:10:00Z"),
            row("a1", 1, "2025-01-01T00:30:00Z", "2025-01-01T00:40:00Z"),
        ];
        let output = Pipeline::default().run(raw);

        assert_eq!(ids(output.cleaned()), vec!["a1", "a2", "b1", "b2"]);
        assert_eq!(output.cleaned()[0].idle_time_sec, None);
        assert_eq!(output.cleaned()[1].idle_time_sec, Some(4800.0));
        assert_eq!(output.cleaned()[2].idle_time_sec, None);
        assert_eq!(output.cleaned()[3].idle_time_sec, Some(3000.0));
    }

    #[test]
    fn test_fleet_grouping_spans_vendors() {
        let raw = vec![
            row("a", 1, "2025-01-01T00:00:00Z", "2025-01-01T00:10:00Z"),
            row("b", 2, "2025-01-01T00:15:00Z", "2025-01-01T00:20:00Z"),
        ];
        let config = PipelineConfig::default().with_group_key(GroupKey::Fleet);
        let output = Pipeline::new(config).unwrap().run(raw);

        assert_eq!(output.cleaned()[1].idle_time_sec, Some(300.0));
    }

    #[test]
    fn test_incomplete_rows_dropped_and_counted() {
        let mut no_coords = row("no_coords", 1, "2025-01-01T00:00:00Z", "2025-01-01T00:10:00Z");
        no_coords.dropoff_latitude = None;

        let raw = vec![
            row("ok", 1, "2025-01-01T00:00:00Z", "2025-01-01T00:10:00Z"),
            row("bad_pickup", 1, "not a time", "2025-01-01T00:10:00Z"),
            row("bad_dropoff", 1, "2025-01-01T00:00:00Z", ""),
            row("backwards", 1, "2025-01-01T00:10:00Z", "2025-01-01T00:00:00Z"),
            no_coords,
        ];
        let output = Pipeline::default().run(raw);

        assert_eq!(ids(output.cleaned()), vec!["ok"]);
        let summary = output.summary();
        assert_eq!(summary.total_rows, 5);
        assert_eq!(summary.cleaned_rows, 1);
        assert_eq!(summary.dropped_rows, 4);
        assert_eq!(summary.missing_pickup, 1);
        assert_eq!(summary.missing_dropoff, 1);
        assert_eq!(summary.missing_duration, 1);
        assert_eq!(summary.missing_distance, 1);
    }

    #[test]
    fn test_outliers_reference_cleaned_records() {
        let mut fast = row("fast", 1, "2025-01-01T00:00:00Z", "2025-01-01T00:01:00Z");
        // ~11 km in one minute
        fast.dropoff_latitude = Some(40.85);

        let raw = vec![
            row("slow", 1, "2025-01-01T00:10:00Z", "2025-01-01T00:30:00Z"),
            fast,
        ];
        let output = Pipeline::default().run(raw);

        assert_eq!(output.summary().outlier_count, 1);
        assert_eq!(ids(output.outlier_records()), vec!["fast"]);
        let position = output.outliers().positions()[0];
        assert!(std::ptr::eq(
            output.outlier_records().next().unwrap(),
            &output.cleaned()[position]
        ));
    }

    #[test]
    fn test_threshold_is_configurable() {
        let raw = vec![row("a", 1, "2025-01-01T00:00:00Z", "2025-01-01T00:01:00Z")];
        // ~1.4 km in one minute is ~83 km/h
        let lenient = Pipeline::default().run(raw.clone());
        let strict = Pipeline::new(PipelineConfig::default().with_max_speed(60.0)).unwrap().run(raw);

        assert_eq!(lenient.summary().outlier_count, 0);
        assert_eq!(strict.summary().outlier_count, 1);
        assert_eq!(strict.cleaned()[0].trip_efficiency, Some(1.0));
    }

    #[test]
    fn test_new_rejects_invalid_speed() {
        let zero = Pipeline::new(PipelineConfig::default().with_max_speed(0.0));
        assert!(matches!(zero, Err(PipelineError::InvalidConfig(_))));

        let nan = Pipeline::new(PipelineConfig::default().with_max_speed(f64::NAN));
        assert!(matches!(nan, Err(PipelineError::InvalidConfig(_))));

        let negative_threshold =
            Pipeline::new(PipelineConfig::default().with_outlier_threshold(-1.0));
        assert!(negative_threshold.is_err());
    }

    #[test]
    fn test_empty_batch() {
        let output = Pipeline::default().run(Vec::new());
        assert!(output.cleaned().is_empty());
        assert!(output.outliers().is_empty());
        assert_eq!(output.summary().total_rows, 0);
    }
}
