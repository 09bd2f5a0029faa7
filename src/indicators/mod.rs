// Technical indicators module
// Pure functions over closed-candle series: no state, no I/O

pub mod ema;
pub mod fractal;

pub use ema::compute_ema;
pub use fractal::{detect_fractals, Fractal};
