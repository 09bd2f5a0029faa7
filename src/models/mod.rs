use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One closed (or, at the tail of a raw fetch, still-forming) kline bucket.
///
/// The gateway strips the forming bar before handing candles to anyone else,
/// so every series seen by the indicator engine and the evaluators contains
/// closed candles only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: DateTime<Utc>,
    pub quote_volume: f64,
    pub trade_count: u64,
    pub taker_buy_base: f64,
    pub taker_buy_quote: f64,
    /// Williams fractal marker attached by the gateway, if any.
    pub fractal: Option<FractalKind>,
}

/// A candle whose high (Up) or low (Down) is a strict local extremum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FractalKind {
    Up,
    Down,
}

/// Trade direction; doubles as the exchange's `positionSide` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
        }
    }

    /// Order side that opens exposure in this direction.
    pub fn entry_side(&self) -> Side {
        match self {
            Direction::Long => Side::Buy,
            Direction::Short => Side::Sell,
        }
    }

    /// Order side that closes exposure in this direction.
    pub fn closing_side(&self) -> Side {
        match self {
            Direction::Long => Side::Sell,
            Direction::Short => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopMarket,
    TakeProfit,
    TakeProfitMarket,
    TrailingStopMarket,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::Stop => "STOP",
            OrderType::StopMarket => "STOP_MARKET",
            OrderType::TakeProfit => "TAKE_PROFIT",
            OrderType::TakeProfitMarket => "TAKE_PROFIT_MARKET",
            OrderType::TrailingStopMarket => "TRAILING_STOP_MARKET",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good Til Canceled
    Gtc,
    /// Immediate Or Cancel
    Ioc,
    /// Fill Or Kill
    Fok,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
        }
    }
}

/// Request to open or close exposure. Constructed fresh per call and never
/// mutated after signing.
#[derive(Debug, Clone)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub position_side: Direction,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub time_in_force: Option<TimeInForce>,
}

/// Exchange acknowledgement of an accepted order.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAck {
    pub order_id: i64,
    pub symbol: String,
    pub status: String,
    #[serde(default)]
    pub client_order_id: String,
}

/// Exchange-reported snapshot of an open position. Fetched on demand, never
/// cached.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionRisk {
    pub symbol: String,
    pub position_side: String,
    pub position_amt: f64,
    pub entry_price: f64,
    pub break_even_price: f64,
    pub mark_price: f64,
    pub unrealized_profit: f64,
    pub liquidation_price: f64,
    pub isolated_margin: f64,
    pub notional: f64,
    pub initial_margin: f64,
    pub maint_margin: f64,
    pub update_time: i64,
}

/// Per-asset futures wallet balance, passed through in the exchange's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Balance {
    pub asset: String,
    pub balance: String,
    pub cross_wallet_balance: String,
    pub available_balance: String,
    pub update_time: i64,
}

/// Futures account snapshot, passed through in the exchange's shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    pub can_trade: bool,
    pub total_wallet_balance: String,
    pub total_unrealized_profit: String,
    pub total_margin_balance: String,
    pub available_balance: String,
}

/// Precision metadata for a traded instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolInfo {
    pub price_precision: u32,
    pub quantity_precision: u32,
}

/// Evaluator output for one tick and direction. Recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradeSignal {
    pub ready: bool,
    pub trade_price: f64,
    pub profit_stop_price: f64,
    pub loss_stop_price: f64,
}

impl TradeSignal {
    pub fn not_ready() -> Self {
        Self {
            ready: false,
            trade_price: 0.0,
            profit_stop_price: 0.0,
            loss_stop_price: 0.0,
        }
    }
}
