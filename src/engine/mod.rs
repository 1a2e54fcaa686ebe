//! Stream stages between the feeds and the council: tick/odds pairing,
//! divergence detection, and paper execution.

pub mod aggregator;
pub mod detector;
pub mod executor;
