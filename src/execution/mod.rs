// Order execution module
// Entry orders and the two-legged protective bracket

pub mod pipeline;

pub use pipeline::{round_to_precision, OrderPipeline};
