// Domain layer - Pure data model and time-series math
pub mod aggregation;
pub mod dashboard;
pub mod error;
pub mod geometry;
pub mod hit_test;
pub mod metric;
pub mod series;
pub mod telemetry;
