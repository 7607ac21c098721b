// Scoring engine: raw-value fallback, percentiles, weighted composite.

pub mod composite;
pub mod fallback;
pub mod percentile;
