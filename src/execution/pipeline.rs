use crate::api::BinanceClient;
use crate::models::{Direction, Order, OrderAck, OrderType, TimeInForce};
use crate::Result;
use tracing::error;

/// Builds and submits entry and bracket orders through the gateway's signing
/// path.
pub struct OrderPipeline {
    client: BinanceClient,
}

impl OrderPipeline {
    pub fn new(client: BinanceClient) -> Self {
        Self { client }
    }

    /// Open exposure in `direction`.
    ///
    /// With a price this is a LIMIT order resting until canceled (GTC);
    /// without one it fills at market.
    pub async fn enter_position(
        &self,
        direction: Direction,
        symbol: &str,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<OrderAck> {
        let order = match price {
            Some(price) => Order {
                symbol: symbol.to_string(),
                side: direction.entry_side(),
                position_side: direction,
                order_type: OrderType::Limit,
                quantity,
                price: Some(price),
                stop_price: None,
                time_in_force: Some(TimeInForce::Gtc),
            },
            None => Order {
                symbol: symbol.to_string(),
                side: direction.entry_side(),
                position_side: direction,
                order_type: OrderType::Market,
                quantity,
                price: None,
                stop_price: None,
                time_in_force: None,
            },
        };
        self.client.place_order(&order).await
    }

    /// Attach the protective bracket: a take-profit leg and a stop-loss leg
    /// on the closing side of the position.
    ///
    /// The exchange offers no atomic bracket primitive, so the legs are two
    /// independent orders. Both are always attempted; a leg that fails while
    /// the entry stands leaves the position unprotected, which is logged at
    /// error severity and surfaced to the caller, never swallowed.
    pub async fn attach_bracket(
        &self,
        symbol: &str,
        direction: Direction,
        quantity: f64,
        profit_stop_price: f64,
        loss_stop_price: f64,
    ) -> Result<(OrderAck, OrderAck)> {
        let side = direction.closing_side();

        let take_profit = self
            .client
            .place_order(&Order {
                symbol: symbol.to_string(),
                side,
                position_side: direction,
                order_type: OrderType::TakeProfitMarket,
                quantity,
                price: None,
                stop_price: Some(profit_stop_price),
                time_in_force: None,
            })
            .await;

        let stop_loss = self
            .client
            .place_order(&Order {
                symbol: symbol.to_string(),
                side,
                position_side: direction,
                order_type: OrderType::StopMarket,
                quantity,
                price: None,
                stop_price: Some(loss_stop_price),
                time_in_force: None,
            })
            .await;

        match (take_profit, stop_loss) {
            (Ok(tp), Ok(sl)) => Ok((tp, sl)),
            (Err(e), Ok(_)) => {
                error!(symbol, "take-profit leg failed, position unprotected: {}", e);
                Err(e)
            }
            (Ok(_), Err(e)) => {
                error!(symbol, "stop-loss leg failed, position unprotected: {}", e);
                Err(e)
            }
            (Err(tp_err), Err(sl_err)) => {
                error!(
                    symbol,
                    "both bracket legs failed, position unprotected: take-profit: {}; stop-loss: {}",
                    tp_err,
                    sl_err
                );
                Err(tp_err)
            }
        }
    }
}

/// Floor `value` to `precision` decimal places. The exchange rejects
/// quantities and prices carrying more precision than the symbol allows.
pub fn round_to_precision(value: f64, precision: u32) -> f64 {
    let factor = 10f64.powi(precision as i32);
    (value * factor).floor() / factor
}
