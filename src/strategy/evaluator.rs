use crate::error::BotError;
use crate::indicators::compute_ema;
use crate::models::{Candle, Direction, TradeSignal};
use crate::strategy::conditions::{advance, BreakDepth, ConditionState, IndicatorSnapshot};
use crate::Result;

const EMA_FAST: usize = 20;
const EMA_MID: usize = 50;
const EMA_SLOW: usize = 100;

/// Drives one direction's condition state over successive ticks and, once
/// every gate holds, prices the trade.
///
/// Created once at process start per direction; the state lives for the
/// process and is threaded explicitly through the pure gate transitions.
pub struct SignalEvaluator {
    direction: Direction,
    state: ConditionState,
    fractal_lookback: usize,
}

impl SignalEvaluator {
    pub fn new(direction: Direction, fractal_lookback: usize) -> Self {
        Self {
            direction,
            state: ConditionState::new(),
            fractal_lookback,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> &ConditionState {
        &self.state
    }

    /// Clear all gates. Called by the scheduler after it consumes a ready
    /// signal.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Run one tick over the closed-candle series.
    ///
    /// On a ready state the trade price is the latest close, and the bracket
    /// levels come off the broken average: the 50-period one when the deep
    /// break triggered, the 20-period one otherwise. Long brackets are
    /// +1% / -2% around that average; short brackets are -5% / +1%. The
    /// asymmetry is a preserved contract of the strategy.
    pub fn evaluate(&mut self, candles: &[Candle]) -> Result<TradeSignal> {
        if candles.is_empty() {
            return Err(BotError::InvalidInput("empty candle series".to_string()));
        }
        if candles.len() <= self.fractal_lookback {
            return Err(BotError::InsufficientData {
                needed: self.fractal_lookback + 1,
                got: candles.len(),
            });
        }

        let closes: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let ema20 = compute_ema(&closes, EMA_FAST)?;
        let ema50 = compute_ema(&closes, EMA_MID)?;
        let ema100 = compute_ema(&closes, EMA_SLOW)?;

        let last = closes.len() - 1;
        let snapshot = IndicatorSnapshot {
            close: closes[last],
            ema20: ema20[last],
            ema50: ema50[last],
            ema100: ema100[last],
            fractal: candles[candles.len() - 1 - self.fractal_lookback].fractal,
        };

        advance(&mut self.state, self.direction, &snapshot);

        if !self.state.is_ready() {
            return Ok(TradeSignal::not_ready());
        }

        let base = match self.state.triggering_depth() {
            Some(BreakDepth::Slow) => snapshot.ema50,
            _ => snapshot.ema20,
        };
        let (profit_stop_price, loss_stop_price) = match self.direction {
            Direction::Long => (base * 1.01, base * 0.98),
            Direction::Short => (base * 0.95, base * 1.01),
        };

        Ok(TradeSignal {
            ready: true,
            trade_price: snapshot.close,
            profit_stop_price,
            loss_stop_price,
        })
    }
}
