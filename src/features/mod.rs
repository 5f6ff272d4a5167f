//! Per-trip feature engineering.
//!
//! This module normalises raw trip fields, derives distance, speed,
//! efficiency and fare features, computes idle time between consecutive
//! trips of the same group, and flags speed outliers.

pub mod derive;
pub mod geo;
pub mod idle;
pub mod normalize;
pub mod outliers;
