// Drift detection
pub mod scan;

// Baseline inspection
pub mod index;
pub mod split;
