pub mod binance;

pub use binance::{BinanceClient, PRODUCTION_BASE_URL, TESTNET_BASE_URL};
