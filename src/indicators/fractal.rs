use crate::error::BotError;
use crate::models::{Candle, FractalKind};
use crate::Result;

/// A detected Williams fractal: the candle at `index` is a strict local
/// extremum of its `2 * period + 1` window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fractal {
    pub kind: FractalKind,
    pub index: usize,
    pub value: f64,
}

/// Scan a closed-candle series for Williams fractals.
///
/// The caller must already have removed the trailing unclosed candle. Centers
/// whose window would extend past the array bounds are not evaluated. An `Up`
/// fractal requires the center's high to equal the window maximum with no
/// other candle in the window sharing that value; `Down` is symmetric on lows.
/// A single center may carry both markers when high and low are each uniquely
/// extreme (degenerate, but not excluded).
pub fn detect_fractals(candles: &[Candle], period: usize) -> Result<Vec<Fractal>> {
    if period < 1 {
        return Err(BotError::InvalidInput(format!(
            "fractal period must be at least 1, got {}",
            period
        )));
    }

    let needed = 2 * period + 1;
    if candles.len() < needed {
        return Err(BotError::InsufficientData {
            needed,
            got: candles.len(),
        });
    }

    let mut fractals = Vec::new();

    for i in period..candles.len() - period {
        let window = &candles[i - period..=i + period];
        let center_high = candles[i].high;
        let center_low = candles[i].low;

        let max = window.iter().map(|c| c.high).fold(f64::NEG_INFINITY, f64::max);
        let min = window.iter().map(|c| c.low).fold(f64::INFINITY, f64::min);

        // Ties anywhere else in the window void the marker.
        if center_high == max && window.iter().filter(|c| c.high == max).count() == 1 {
            fractals.push(Fractal {
                kind: FractalKind::Up,
                index: i,
                value: center_high,
            });
        }

        if center_low == min && window.iter().filter(|c| c.low == min).count() == 1 {
            fractals.push(Fractal {
                kind: FractalKind::Down,
                index: i,
                value: center_low,
            });
        }
    }

    Ok(fractals)
}
