//! Speed outlier detection.
//!
//! Outliers are kept as positions into the cleaned records rather than
//! copies, in the order the scan encountered them.

use crate::record::TripRecord;

/// Ordered positions of trips whose speed exceeded the threshold.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeedOutliers {
    positions: Vec<usize>,
}

impl SpeedOutliers {
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Resolves the positions against the slice that was scanned.
    ///
    /// # Panics
    ///
    /// If `records` is shorter than the scanned slice.
    pub fn records<'a>(&'a self, records: &'a [TripRecord]) -> impl Iterator<Item = &'a TripRecord> {
        self.positions.iter().map(move |&i| &records[i])
    }
}

/// Append-only collector fed one record at a time.
#[derive(Debug)]
pub struct OutlierCollector {
    threshold_kmh: f64,
    next_position: usize,
    found: SpeedOutliers,
}

impl OutlierCollector {
    pub fn new(threshold_kmh: f64) -> Self {
        Self {
            threshold_kmh,
            next_position: 0,
            found: SpeedOutliers::default(),
        }
    }

    /// Strictly greater than the threshold qualifies; a missing speed counts
    /// as zero and never does.
    pub fn is_outlier(&self, record: &TripRecord) -> bool {
        record.speed_or_zero() > self.threshold_kmh
    }

    pub fn push(&mut self, record: &TripRecord) {
        if self.is_outlier(record) {
            self.found.positions.push(self.next_position);
        }
        self.next_position += 1;
    }

    pub fn finish(self) -> SpeedOutliers {
        self.found
    }

    /// Scans `records` in order in a single pass.
    pub fn scan(records: &[TripRecord], threshold_kmh: f64) -> SpeedOutliers {
        let mut collector = Self::new(threshold_kmh);
        for record in records {
            collector.push(record);
        }
        collector.finish()
    }
}

/// Borrowed outliers of `records`, in encounter order.
pub fn collect_speed_outliers(records: &[TripRecord], threshold_kmh: f64) -> Vec<&TripRecord> {
    OutlierCollector::scan(records, threshold_kmh)
        .positions
        .into_iter()
        .map(|i| &records[i])
        .collect()
}
