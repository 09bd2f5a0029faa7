use thiserror::Error;

/// Failure taxonomy for the trading core.
///
/// Gate outcomes in the condition state machine are booleans, never errors;
/// these variants cover everything outside it.
#[derive(Debug, Error)]
pub enum BotError {
    /// Bad arguments handed to an indicator. Fatal to the call, not retried.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Candle series too short for the requested computation. The tick is
    /// skipped for that direction with no state change.
    #[error("insufficient data: need at least {needed} candles, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Transport/HTTP failure reaching the exchange. The tick aborts and
    /// condition state is left untouched for the next tick to re-evaluate.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The exchange declined a signed order. Carries the raw exchange payload.
    #[error("order rejected by exchange: {payload}")]
    OrderRejected { payload: String },

    /// The exchange's instrument list omits the symbol. Configuration error.
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
}

impl From<reqwest::Error> for BotError {
    fn from(err: reqwest::Error) -> Self {
        BotError::Upstream(err.to_string())
    }
}
