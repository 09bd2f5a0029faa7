use crate::api::BinanceClient;
use crate::config::Config;
use crate::error::BotError;
use crate::execution::{round_to_precision, OrderPipeline};
use crate::models::{Direction, OrderAck, TradeSignal};
use crate::strategy::SignalEvaluator;
use crate::Result;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{info, warn};

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// A position is already open for the symbol; nothing was evaluated.
    PositionOpen,
    /// Both directions evaluated; no trade-ready state.
    NoEntry,
    /// An entry was placed and the bracket attached.
    Entered {
        direction: Direction,
        entry: OrderAck,
        take_profit: OrderAck,
        stop_loss: OrderAck,
    },
}

/// The periodic driver: one tick fetches market state, advances both
/// directions' condition machines, and turns a ready signal into orders.
///
/// The two `SignalEvaluator`s are the only mutable state and are owned
/// exclusively here, so ticks must never overlap; the run loop serializes
/// them by dropping ticks that would fire while one is still running.
pub struct TradeScheduler {
    client: BinanceClient,
    pipeline: OrderPipeline,
    config: Config,
    long: SignalEvaluator,
    short: SignalEvaluator,
}

impl TradeScheduler {
    pub fn new(client: BinanceClient, config: Config) -> Self {
        let pipeline = OrderPipeline::new(client.clone());
        let fractal_period = config.fractal_period;
        Self {
            client,
            pipeline,
            config,
            long: SignalEvaluator::new(Direction::Long, fractal_period),
            short: SignalEvaluator::new(Direction::Short, fractal_period),
        }
    }

    /// Run forever on a fixed interval. A tick still in flight when the next
    /// one is due makes the loop skip ahead rather than queue work.
    pub async fn run(mut self) {
        let mut ticker = interval(Duration::from_secs(self.config.tick_seconds));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.run_tick().await {
                Ok(TickOutcome::PositionOpen) | Ok(TickOutcome::NoEntry) => {}
                Ok(TickOutcome::Entered {
                    direction,
                    entry,
                    take_profit,
                    stop_loss,
                }) => {
                    info!(
                        "✅ entered {} {} (order {}), bracket {}/{}",
                        direction.as_str(),
                        self.config.symbol,
                        entry.order_id,
                        take_profit.order_id,
                        stop_loss.order_id
                    );
                }
                // condition state is untouched; the next tick re-evaluates
                // from where this one left off
                Err(e) => warn!("tick aborted: {}", e),
            }
        }
    }

    /// One evaluation cycle.
    pub async fn run_tick(&mut self) -> Result<TickOutcome> {
        let symbol = self.config.symbol.clone();

        // a single open position per symbol: skip evaluation entirely while
        // one exists
        if let Some(position) = self.client.fetch_position_risk(&symbol).await? {
            info!(
                "open {} position on {} (amt {}, entry {}), skipping evaluation",
                position.position_side, position.symbol, position.position_amt,
                position.entry_price
            );
            return Ok(TickOutcome::PositionOpen);
        }

        let candles = match self
            .client
            .fetch_candles(&symbol, &self.config.interval, self.config.candle_limit)
            .await
        {
            Ok(candles) => candles,
            Err(BotError::InsufficientData { needed, got }) => {
                warn!(
                    "only {} closed candles (need {}), skipping tick",
                    got, needed
                );
                return Ok(TickOutcome::NoEntry);
            }
            Err(e) => return Err(e),
        };

        // both directions run over the same closed series; their states are
        // independent, and both complete before any entry is acted on
        let mut ready: Option<(Direction, TradeSignal)> = None;
        for evaluator in [&mut self.long, &mut self.short] {
            let direction = evaluator.direction();
            let signal = match evaluator.evaluate(&candles) {
                Ok(signal) => signal,
                Err(BotError::InsufficientData { needed, got }) => {
                    warn!(
                        "{}: only {} closed candles (need {}), skipping direction",
                        direction.as_str(),
                        got,
                        needed
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            if signal.ready && ready.is_none() {
                ready = Some((direction, signal));
            }
        }

        let Some((direction, signal)) = ready else {
            return Ok(TickOutcome::NoEntry);
        };

        info!(
            "🎯 {} signal ready: price {}, take-profit {}, stop-loss {}",
            direction.as_str(),
            signal.trade_price,
            signal.profit_stop_price,
            signal.loss_stop_price
        );

        let symbol_info = self.client.fetch_symbol_info(&symbol).await?;
        let quantity =
            round_to_precision(self.config.trade_quantity, symbol_info.quantity_precision);
        let profit_stop =
            round_to_precision(signal.profit_stop_price, symbol_info.price_precision);
        let loss_stop = round_to_precision(signal.loss_stop_price, symbol_info.price_precision);

        let entry = self
            .pipeline
            .enter_position(direction, &symbol, quantity, None)
            .await?;

        // the signal is consumed by the entry; clear the gates so the next
        // setup starts fresh
        match direction {
            Direction::Long => self.long.reset(),
            Direction::Short => self.short.reset(),
        }

        let (take_profit, stop_loss) = self
            .pipeline
            .attach_bracket(&symbol, direction, quantity, profit_stop, loss_stop)
            .await?;

        Ok(TickOutcome::Entered {
            direction,
            entry,
            take_profit,
            stop_loss,
        })
    }
}
