use crate::api::{PRODUCTION_BASE_URL, TESTNET_BASE_URL};
use crate::error::BotError;
use crate::Result;

/// Runtime configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub symbol: String,
    pub interval: String,
    pub candle_limit: u32,
    pub fractal_period: usize,
    pub trade_quantity: f64,
    pub tick_seconds: u64,
}

impl Config {
    /// Read configuration from the environment. The testnet endpoint is the
    /// default; set `BOT_ENV=production` to trade against the live exchange.
    pub fn from_env() -> Result<Self> {
        let api_key = require_env("BINANCE_API_KEY")?;
        let secret_key = require_env("BINANCE_SECRET_KEY")?;

        let base_url = match std::env::var("BOT_ENV").as_deref() {
            Ok("production") => PRODUCTION_BASE_URL,
            _ => TESTNET_BASE_URL,
        }
        .to_string();

        Ok(Self {
            api_key,
            secret_key,
            base_url,
            symbol: env_or("SYMBOL", "XRPUSDT"),
            interval: env_or("CANDLE_INTERVAL", "1m"),
            candle_limit: parse_env("CANDLE_LIMIT", 100)?,
            fractal_period: parse_env("FRACTAL_PERIOD", 2)?,
            trade_quantity: parse_env("TRADE_QUANTITY", 5.0)?,
            tick_seconds: parse_env("TICK_SECONDS", 60)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key)
        .map_err(|_| BotError::InvalidInput(format!("{} not found in environment", key)))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| BotError::InvalidInput(format!("{} is not a valid value: {:?}", key, raw))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_reported() {
        let err = require_env("FRACTALBOT_TEST_UNSET_KEY").unwrap_err();
        assert!(err.to_string().contains("FRACTALBOT_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_parse_env_default() {
        let limit: u32 = parse_env("FRACTALBOT_TEST_UNSET_LIMIT", 100).unwrap();
        assert_eq!(limit, 100);
    }
}
