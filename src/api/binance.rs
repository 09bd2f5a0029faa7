use crate::config::Config;
use crate::error::BotError;
use crate::indicators::detect_fractals;
use crate::models::{
    AccountSnapshot, Balance, Candle, Order, OrderAck, PositionRisk, SymbolInfo,
};
use crate::Result;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

pub const PRODUCTION_BASE_URL: &str = "https://fapi.binance.com";
pub const TESTNET_BASE_URL: &str = "https://testnet.binancefuture.com";

type HmacSha256 = Hmac<Sha256>;

/// Client for the Binance USDⓈ-M futures API
///
/// Owns request signing and server-time synchronization. Every signed request
/// takes its `timestamp` from the exchange's time endpoint; a locally sourced
/// timestamp drifts outside the exchange's accepted window and gets the
/// signature rejected.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    fractal_period: usize,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionRiskRaw {
    symbol: String,
    position_side: String,
    position_amt: String,
    entry_price: String,
    #[serde(default)]
    break_even_price: String,
    mark_price: String,
    un_realized_profit: String,
    liquidation_price: String,
    #[serde(default)]
    isolated_margin: String,
    #[serde(default)]
    notional: String,
    #[serde(default)]
    initial_margin: String,
    #[serde(default)]
    maint_margin: String,
    #[serde(default)]
    update_time: i64,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<ExchangeSymbol>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExchangeSymbol {
    symbol: String,
    price_precision: u32,
    quantity_precision: u32,
}

// ============== Implementation ==============

impl BinanceClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        fractal_period: usize,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            fractal_period,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            config.secret_key.clone(),
            config.fractal_period,
        )
    }

    /// Liveness check against the exchange.
    pub async fn ping(&self) -> Result<()> {
        let url = format!("{}/fapi/v1/ping", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BotError::Upstream(format!(
                "ping returned {}",
                response.status()
            )));
        }
        Ok(())
    }

    /// Current exchange time in epoch millis.
    pub async fn server_time(&self) -> Result<i64> {
        let url = format!("{}/fapi/v1/time", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BotError::Upstream(format!(
                "time endpoint returned {}",
                response.status()
            )));
        }
        let time: ServerTime = response.json().await?;
        Ok(time.server_time)
    }

    /// Serialize `params` as `key=value` pairs in insertion order and append
    /// the hex HMAC-SHA256 signature.
    ///
    /// The exchange verifies the signature against the exact byte sequence it
    /// receives, so the pairs must never be reordered between signing and
    /// sending.
    pub fn sign_query(&self, params: &[(&str, String)]) -> Result<String> {
        let query = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, value))
            .collect::<Vec<_>>()
            .join("&");

        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| BotError::InvalidInput(format!("HMAC key rejected: {}", e)))?;
        mac.update(query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());

        Ok(format!("{}&signature={}", query, signature))
    }

    /// GET a signed endpoint: appends the exchange-sourced timestamp, signs,
    /// and sends with the API key header.
    async fn signed_get(
        &self,
        path: &str,
        mut params: Vec<(&str, String)>,
    ) -> Result<reqwest::Response> {
        let timestamp = self.server_time().await?;
        params.push(("timestamp", timestamp.to_string()));
        let query = self.sign_query(&params)?;

        let url = format!("{}{}?{}", self.base_url, path, query);
        let response = self
            .client
            .get(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        Ok(response)
    }

    /// Fetch candles, attach fractal markers, and strip the trailing
    /// unclosed bar.
    ///
    /// The returned series contains closed candles only; indicator math never
    /// sees the currently-forming bar.
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}/fapi/v1/klines", self.base_url);
        let limit = limit.to_string();
        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(BotError::Upstream(format!(
                "klines returned {}",
                response.status()
            )));
        }

        let rows: Vec<Value> = response.json().await?;
        let mut candles = rows
            .iter()
            .map(parse_kline_row)
            .collect::<Result<Vec<Candle>>>()?;

        // the final row is the currently-forming bucket
        candles.pop();

        let fractals = detect_fractals(&candles, self.fractal_period)?;
        for fractal in &fractals {
            candles[fractal.index].fractal = Some(fractal.kind);
        }

        Ok(candles)
    }

    /// Open-position snapshot for `symbol`, or `None` when the account holds
    /// no position there. The absence of a position is not an error.
    pub async fn fetch_position_risk(&self, symbol: &str) -> Result<Option<PositionRisk>> {
        let response = self
            .signed_get("/fapi/v2/positionRisk", vec![("symbol", symbol.to_string())])
            .await?;

        if !response.status().is_success() {
            return Err(BotError::Upstream(format!(
                "positionRisk returned {}",
                response.status()
            )));
        }

        let rows: Vec<PositionRiskRaw> = response.json().await?;
        for raw in rows {
            let position = position_risk_from_raw(raw)?;
            if position.symbol == symbol && position.position_amt != 0.0 {
                return Ok(Some(position));
            }
        }
        Ok(None)
    }

    /// Per-asset futures wallet balances.
    pub async fn fetch_balances(&self) -> Result<Vec<Balance>> {
        let response = self.signed_get("/fapi/v2/balance", Vec::new()).await?;
        if !response.status().is_success() {
            return Err(BotError::Upstream(format!(
                "balance returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Futures account snapshot.
    pub async fn fetch_account(&self) -> Result<AccountSnapshot> {
        let response = self.signed_get("/fapi/v2/account", Vec::new()).await?;
        if !response.status().is_success() {
            return Err(BotError::Upstream(format!(
                "account returned {}",
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    /// Price/quantity precision for `symbol` from the exchange's instrument
    /// list.
    pub async fn fetch_symbol_info(&self, symbol: &str) -> Result<SymbolInfo> {
        let url = format!("{}/fapi/v1/exchangeInfo", self.base_url);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BotError::Upstream(format!(
                "exchangeInfo returned {}",
                response.status()
            )));
        }

        let info: ExchangeInfo = response.json().await?;
        info.symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .map(|s| SymbolInfo {
                price_precision: s.price_precision,
                quantity_precision: s.quantity_precision,
            })
            .ok_or_else(|| BotError::SymbolNotFound(symbol.to_string()))
    }

    /// Build, sign and submit an order. The signed query travels in the URL
    /// with an empty body, matching the exchange's form-encoded POST
    /// convention. Exchange-side rejection surfaces as `OrderRejected` with
    /// the raw payload.
    pub async fn place_order(&self, order: &Order) -> Result<OrderAck> {
        let mut params: Vec<(&str, String)> = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("positionSide", order.position_side.as_str().to_string()),
            ("type", order.order_type.as_str().to_string()),
            ("quantity", format_number(order.quantity)),
        ];
        if let Some(price) = order.price {
            params.push(("price", format_number(price)));
        }
        if let Some(stop_price) = order.stop_price {
            params.push(("stopPrice", format_number(stop_price)));
        }
        if let Some(tif) = order.time_in_force {
            params.push(("timeInForce", tif.as_str().to_string()));
        }

        let timestamp = self.server_time().await?;
        params.push(("timestamp", timestamp.to_string()));
        let query = self.sign_query(&params)?;

        let url = format!("{}/fapi/v1/order?{}", self.base_url, query);
        let response = self
            .client
            .post(&url)
            .header("X-MBX-APIKEY", &self.api_key)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let payload = response.text().await.unwrap_or_default();
            return Err(BotError::OrderRejected { payload });
        }

        Ok(response.json().await?)
    }
}

// ============== Row Parsing ==============

/// Decode one 11-field kline row:
/// `[openTime, open, high, low, close, volume, closeTime, quoteVolume,
///   tradeCount, takerBuyBase, takerBuyQuote]`
fn parse_kline_row(row: &Value) -> Result<Candle> {
    let fields = row
        .as_array()
        .ok_or_else(|| BotError::Upstream("kline row is not an array".to_string()))?;
    if fields.len() < 11 {
        return Err(BotError::Upstream(format!(
            "kline row has {} fields, expected 11",
            fields.len()
        )));
    }

    Ok(Candle {
        open_time: json_millis(&fields[0])?,
        open: json_f64(&fields[1])?,
        high: json_f64(&fields[2])?,
        low: json_f64(&fields[3])?,
        close: json_f64(&fields[4])?,
        volume: json_f64(&fields[5])?,
        close_time: json_millis(&fields[6])?,
        quote_volume: json_f64(&fields[7])?,
        trade_count: fields[8]
            .as_u64()
            .ok_or_else(|| BotError::Upstream("kline trade count is not an integer".to_string()))?,
        taker_buy_base: json_f64(&fields[9])?,
        taker_buy_quote: json_f64(&fields[10])?,
        fractal: None,
    })
}

/// The exchange sends prices and volumes as JSON strings.
fn json_f64(value: &Value) -> Result<f64> {
    match value {
        Value::String(s) => s
            .parse()
            .map_err(|_| BotError::Upstream(format!("malformed numeric field: {:?}", s))),
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| BotError::Upstream(format!("malformed numeric field: {}", n))),
        other => Err(BotError::Upstream(format!(
            "malformed numeric field: {}",
            other
        ))),
    }
}

fn json_millis(value: &Value) -> Result<DateTime<Utc>> {
    let millis = value
        .as_i64()
        .ok_or_else(|| BotError::Upstream(format!("malformed timestamp field: {}", value)))?;
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| BotError::Upstream(format!("timestamp out of range: {}", millis)))
}

fn parse_field(name: &str, value: &str) -> Result<f64> {
    if value.is_empty() {
        return Ok(0.0);
    }
    value
        .parse()
        .map_err(|_| BotError::Upstream(format!("malformed {} field: {:?}", name, value)))
}

fn position_risk_from_raw(raw: PositionRiskRaw) -> Result<PositionRisk> {
    Ok(PositionRisk {
        position_amt: parse_field("positionAmt", &raw.position_amt)?,
        entry_price: parse_field("entryPrice", &raw.entry_price)?,
        break_even_price: parse_field("breakEvenPrice", &raw.break_even_price)?,
        mark_price: parse_field("markPrice", &raw.mark_price)?,
        unrealized_profit: parse_field("unRealizedProfit", &raw.un_realized_profit)?,
        liquidation_price: parse_field("liquidationPrice", &raw.liquidation_price)?,
        isolated_margin: parse_field("isolatedMargin", &raw.isolated_margin)?,
        notional: parse_field("notional", &raw.notional)?,
        initial_margin: parse_field("initialMargin", &raw.initial_margin)?,
        maint_margin: parse_field("maintMargin", &raw.maint_margin)?,
        symbol: raw.symbol,
        position_side: raw.position_side,
        update_time: raw.update_time,
    })
}

/// Float-to-param formatting; `Display` drops trailing zeros (`5.0` -> "5").
fn format_number(value: f64) -> String {
    format!("{}", value)
}
