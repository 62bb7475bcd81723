pub mod aggregator;
pub mod overview;
