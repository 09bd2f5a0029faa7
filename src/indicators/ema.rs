use crate::error::BotError;
use crate::Result;

/// Calculate an Exponential Moving Average series.
///
/// The output is aligned index-for-index with the input and seeded with the
/// first close (not a simple moving average), then recurses forward with
/// `ema[i] = close[i] * k + ema[i-1] * (1 - k)` where `k = 2 / (period + 1)`.
pub fn compute_ema(closes: &[f64], period: usize) -> Result<Vec<f64>> {
    if closes.is_empty() {
        return Err(BotError::InvalidInput("empty close series".to_string()));
    }
    if period < 1 {
        return Err(BotError::InvalidInput(format!(
            "EMA period must be at least 1, got {}",
            period
        )));
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = Vec::with_capacity(closes.len());
    ema.push(closes[0]);

    for i in 1..closes.len() {
        let prev = ema[i - 1];
        ema.push(closes[i] * k + prev * (1.0 - k));
    }

    Ok(ema)
}
