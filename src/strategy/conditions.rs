use crate::models::{Direction, FractalKind};

/// One tick's indicator readings over the closed-candle series.
///
/// `fractal` is the marker found at candle index `len - 1 - lookback`, where
/// the lookback is the configured fractal period.
#[derive(Debug, Clone, Copy)]
pub struct IndicatorSnapshot {
    pub close: f64,
    pub ema20: f64,
    pub ema50: f64,
    pub ema100: f64,
    pub fractal: Option<FractalKind>,
}

/// The six entry gates for one direction.
///
/// Gates are sticky: each records "this happened at some point since the last
/// reset", not "this holds now". A gate is only ever set true individually;
/// the sole clearing path is [`ConditionState::reset`], invoked when the
/// pre-check fails or when the caller consumes a ready signal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConditionState {
    /// Gate 1: the moving averages are stacked in trend order.
    pub ema_ordered: bool,
    /// Gate 2: price broke through the 20-period average against the trend.
    pub price_broke_fast: bool,
    /// Gate 2': price broke through the 50-period average.
    pub price_broke_slow: bool,
    /// Gate 3: a reversal fractal of the expected kind appeared at the
    /// lookback index.
    pub fractal_confirmed: bool,
    /// Gate 4: price re-crossed the 20-period average in the trade direction.
    pub crossed_fast_back: bool,
    /// Gate 4: price re-crossed the 50-period average in the trade direction.
    pub crossed_slow_back: bool,
}

/// Which break depth gate 4 answers to. The shallow break wins when both
/// gates 2 and 2' are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakDepth {
    Fast,
    Slow,
}

impl ConditionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear every gate in one step.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// All four stages satisfied. Stays true across ticks until the caller
    /// resets the state or the pre-check fails.
    pub fn is_ready(&self) -> bool {
        self.ema_ordered
            && (self.price_broke_fast || self.price_broke_slow)
            && self.fractal_confirmed
            && (self.crossed_fast_back || self.crossed_slow_back)
    }

    /// The depth whose average gate 4 re-crosses, once a break is recorded.
    pub fn triggering_depth(&self) -> Option<BreakDepth> {
        if self.price_broke_fast {
            Some(BreakDepth::Fast)
        } else if self.price_broke_slow {
            Some(BreakDepth::Slow)
        } else {
            None
        }
    }
}

/// The reset predicate: a LONG setup is abandoned once price falls to the
/// 100-period average, a SHORT setup once price rises to the 20-period
/// average.
pub fn pre_check(direction: Direction, snapshot: &IndicatorSnapshot) -> bool {
    match direction {
        Direction::Long => snapshot.close > snapshot.ema100,
        Direction::Short => snapshot.close < snapshot.ema20,
    }
}

/// Advance the gate sequence by one tick.
///
/// Each gate is evaluated only after its predecessor holds, so on any state
/// reachable through this function `crossed_*` implies `fractal_confirmed`
/// implies a recorded break implies `ema_ordered`. A gate set earlier this
/// tick counts as its successor's prerequisite within the same tick.
pub fn advance(state: &mut ConditionState, direction: Direction, snapshot: &IndicatorSnapshot) {
    if !pre_check(direction, snapshot) {
        state.reset();
        return;
    }

    // Gate 1: trend order
    let ordered = match direction {
        Direction::Long => snapshot.ema20 > snapshot.ema50 && snapshot.ema50 > snapshot.ema100,
        Direction::Short => snapshot.ema20 < snapshot.ema50 && snapshot.ema50 < snapshot.ema100,
    };
    if ordered {
        state.ema_ordered = true;
    }
    if !state.ema_ordered {
        return;
    }

    // Gate 2: shallow break through the 20-period average against the trend
    let broke_fast = match direction {
        Direction::Long => snapshot.close < snapshot.ema20,
        Direction::Short => snapshot.close > snapshot.ema20,
    };
    if broke_fast {
        state.price_broke_fast = true;
    }

    // Gate 2': deep break; both directions watch the 50-period average from
    // below
    if snapshot.close < snapshot.ema50 {
        state.price_broke_slow = true;
    }

    if !(state.price_broke_fast || state.price_broke_slow) {
        return;
    }

    // Gate 3: reversal fractal at the lookback index
    let expected = match direction {
        Direction::Long => FractalKind::Down,
        Direction::Short => FractalKind::Up,
    };
    if snapshot.fractal == Some(expected) {
        state.fractal_confirmed = true;
    }
    if !state.fractal_confirmed {
        return;
    }

    // Gate 4: re-cross through the broken average in the trade direction
    match state.triggering_depth() {
        Some(BreakDepth::Fast) => {
            let crossed = match direction {
                Direction::Long => snapshot.close > snapshot.ema20,
                Direction::Short => snapshot.close < snapshot.ema20,
            };
            if crossed {
                state.crossed_fast_back = true;
            }
        }
        Some(BreakDepth::Slow) => {
            let crossed = match direction {
                Direction::Long => snapshot.close > snapshot.ema50,
                Direction::Short => snapshot.close < snapshot.ema50,
            };
            if crossed {
                state.crossed_slow_back = true;
            }
        }
        None => {}
    }
}
