//! Run configuration for the trip pipeline.
//!
//! Stored as a plain JSON object on disk, every key optional:
//! ```json
//! {
//!   "max_speed_kmh": 120.0,
//!   "outlier_threshold_kmh": 120.0,
//!   "group_key": "vendor"
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{PipelineError, Result};
use crate::record::TripRecord;

/// Default maximum expected speed, used both to normalise efficiency and as
/// the outlier threshold.
pub const DEFAULT_MAX_SPEED_KMH: f64 = 120.0;

/// How trips are grouped when computing idle time between consecutive trips.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupKey {
    /// One group per `vendor_id`. Trips without a vendor form their own group.
    #[default]
    Vendor,
    /// Every trip belongs to a single group.
    Fleet,
}

impl GroupKey {
    /// Sort/group key for a record. `None` for the fleet-wide grouping and
    /// for trips with no vendor.
    pub fn key_of(&self, record: &TripRecord) -> Option<i64> {
        match self {
            GroupKey::Vendor => record.vendor_id,
            GroupKey::Fleet => None,
        }
    }
}

impl FromStr for GroupKey {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vendor" | "vendor_id" => Ok(GroupKey::Vendor),
            "fleet" | "none" => Ok(GroupKey::Fleet),
            other => Err(PipelineError::InvalidConfig(format!(
                "unknown group key '{other}' (expected 'vendor' or 'fleet')"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Speed that maps to an efficiency of 1.0.
    pub max_speed_kmh: f64,
    /// Trips strictly faster than this are reported as outliers.
    pub outlier_threshold_kmh: f64,
    pub group_key: GroupKey,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_speed_kmh: DEFAULT_MAX_SPEED_KMH,
            outlier_threshold_kmh: DEFAULT_MAX_SPEED_KMH,
            group_key: GroupKey::Vendor,
        }
    }
}

impl PipelineConfig {
    /// Loads the config from a JSON file at `path`. Missing keys keep their
    /// defaults.
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::InvalidConfig(format!("{path}: {e}")))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| PipelineError::InvalidConfig(format!("{path}: {e}")))?;
        config.validate()
    }

    /// Sets both the efficiency ceiling and the outlier threshold.
    pub fn with_max_speed(mut self, kmh: f64) -> Self {
        self.max_speed_kmh = kmh;
        self.outlier_threshold_kmh = kmh;
        self
    }

    pub fn with_outlier_threshold(mut self, kmh: f64) -> Self {
        self.outlier_threshold_kmh = kmh;
        self
    }

    pub fn with_group_key(mut self, group_key: GroupKey) -> Self {
        self.group_key = group_key;
        self
    }

    /// Rejects speeds that would make efficiency or the outlier scan
    /// meaningless.
    pub fn validate(self) -> Result<Self> {
        if !self.max_speed_kmh.is_finite() || self.max_speed_kmh <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "max_speed_kmh must be a positive number, got {}",
                self.max_speed_kmh
            )));
        }
        if !self.outlier_threshold_kmh.is_finite() || self.outlier_threshold_kmh < 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "outlier_threshold_kmh must be a non-negative number, got {}",
                self.outlier_threshold_kmh
            )));
        }
        Ok(self)
    }
}
