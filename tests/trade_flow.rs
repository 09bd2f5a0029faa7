use fractalbot::api::BinanceClient;
use fractalbot::config::Config;
use fractalbot::scheduler::{TickOutcome, TradeScheduler};
use fractalbot::Direction;
use serde_json::{json, Value};

fn test_config(base_url: &str) -> Config {
    Config {
        api_key: "test_key".to_string(),
        secret_key: "test_secret".to_string(),
        base_url: base_url.to_string(),
        symbol: "XRPUSDT".to_string(),
        interval: "1m".to_string(),
        candle_limit: 200,
        fractal_period: 2,
        trade_quantity: 5.0,
        tick_seconds: 60,
    }
}

fn scheduler(server: &mockito::Server) -> TradeScheduler {
    let config = test_config(&server.url());
    let client = BinanceClient::from_config(&config);
    TradeScheduler::new(client, config)
}

fn kline_row(index: usize, close: f64, high: f64, low: f64) -> Value {
    let open_time = 1_700_000_000_000i64 + index as i64 * 60_000;
    json!([
        open_time,
        close.to_string(),
        high.to_string(),
        low.to_string(),
        close.to_string(),
        "1000.0",
        open_time + 59_999,
        "5000.0",
        42,
        "500.0",
        "2500.0"
    ])
}

/// Closed candles rising one unit per bar, plus extras, plus one forming bar
/// the gateway strips.
fn klines_payload(extra: &[(f64, f64, f64)]) -> String {
    let mut rows: Vec<Value> = (0..100)
        .map(|i| {
            let close = 100.0 + i as f64;
            kline_row(i, close, close + 0.5, close - 0.5)
        })
        .collect();
    for (i, &(close, high, low)) in extra.iter().enumerate() {
        rows.push(kline_row(100 + i, close, high, low));
    }
    // forming bar, dropped before anything sees it
    let last = rows.len();
    rows.push(kline_row(last, 1.0, 1.0, 1.0));
    json!(rows).to_string()
}

async fn mock_time(server: &mut mockito::Server) -> mockito::Mock {
    server
        .mock("GET", "/fapi/v1/time")
        .match_query(mockito::Matcher::Any)
        .with_body(r#"{"serverTime":1700000000000}"#)
        .create_async()
        .await
}

async fn mock_no_position(server: &mut mockito::Server) -> mockito::Mock {
    server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(mockito::Matcher::Any)
        .with_body("[]")
        .create_async()
        .await
}

async fn mock_klines(server: &mut mockito::Server, payload: String) -> mockito::Mock {
    server
        .mock("GET", "/fapi/v1/klines")
        .match_query(mockito::Matcher::Any)
        .with_header("content-type", "application/json")
        .with_body(payload)
        .create_async()
        .await
}

#[tokio::test]
async fn test_long_setup_enters_with_bracket_on_recovery_tick() {
    let mut server = mockito::Server::new_async().await;
    let _time = mock_time(&mut server).await;
    let _flat = mock_no_position(&mut server).await;

    let _info = server
        .mock("GET", "/fapi/v1/exchangeInfo")
        .match_query(mockito::Matcher::Any)
        .with_body(
            json!({"symbols": [{"symbol": "XRPUSDT", "pricePrecision": 4, "quantityPrecision": 1}]})
                .to_string(),
        )
        .create_async()
        .await;

    let order_mock = server
        .mock("POST", "/fapi/v1/order")
        .match_query(mockito::Matcher::Any)
        .with_body(
            json!({
                "orderId": 777,
                "symbol": "XRPUSDT",
                "status": "NEW",
                "clientOrderId": "x"
            })
            .to_string(),
        )
        .expect(3)
        .create_async()
        .await;

    let mut scheduler = scheduler(&server);

    // tick 1: clean uptrend, trend-order gate only
    let klines = mock_klines(&mut server, klines_payload(&[])).await;
    assert!(matches!(
        scheduler.run_tick().await.unwrap(),
        TickOutcome::NoEntry
    ));
    klines.remove_async().await;

    // tick 2: one bar dips below the 20-period average; its low will become
    // a down-fractal once two more bars close
    let dip = (185.0, 185.5, 180.0);
    let klines = mock_klines(&mut server, klines_payload(&[dip])).await;
    assert!(matches!(
        scheduler.run_tick().await.unwrap(),
        TickOutcome::NoEntry
    ));
    klines.remove_async().await;

    // tick 3: sideways bar; the fractal is not yet confirmable
    let drift = (186.0, 186.5, 184.0);
    let klines = mock_klines(&mut server, klines_payload(&[dip, drift])).await;
    assert!(matches!(
        scheduler.run_tick().await.unwrap(),
        TickOutcome::NoEntry
    ));
    klines.remove_async().await;

    // tick 4: recovery above the 20-period average; the dip's down-fractal
    // now sits exactly at the lookback index
    let recovery = (195.0, 195.5, 188.0);
    let klines = mock_klines(&mut server, klines_payload(&[dip, drift, recovery])).await;
    let outcome = scheduler.run_tick().await.unwrap();
    klines.remove_async().await;

    match outcome {
        TickOutcome::Entered {
            direction,
            entry,
            take_profit,
            stop_loss,
        } => {
            assert_eq!(direction, Direction::Long);
            assert_eq!(entry.order_id, 777);
            assert_eq!(take_profit.order_id, 777);
            assert_eq!(stop_loss.order_id, 777);
        }
        other => panic!("expected an entry, got {:?}", other),
    }

    // entry + take-profit + stop-loss
    order_mock.assert_async().await;
}

#[tokio::test]
async fn test_open_position_skips_evaluation() {
    let mut server = mockito::Server::new_async().await;
    let _time = mock_time(&mut server).await;
    let _position = server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(mockito::Matcher::Any)
        .with_body(
            json!([{
                "symbol": "XRPUSDT",
                "positionSide": "LONG",
                "positionAmt": "5",
                "entryPrice": "2.4",
                "markPrice": "2.5",
                "unRealizedProfit": "0.5",
                "liquidationPrice": "1.2"
            }])
            .to_string(),
        )
        .create_async()
        .await;
    // candles must not be fetched while a position is open
    let klines = server
        .mock("GET", "/fapi/v1/klines")
        .match_query(mockito::Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let mut scheduler = scheduler(&server);
    assert!(matches!(
        scheduler.run_tick().await.unwrap(),
        TickOutcome::PositionOpen
    ));
    klines.assert_async().await;
}

#[tokio::test]
async fn test_flat_position_report_proceeds_to_evaluation() {
    let mut server = mockito::Server::new_async().await;
    let _time = mock_time(&mut server).await;
    // the exchange reports the symbol with zero position amount
    let _flat = server
        .mock("GET", "/fapi/v2/positionRisk")
        .match_query(mockito::Matcher::Any)
        .with_body(
            json!([{
                "symbol": "XRPUSDT",
                "positionSide": "BOTH",
                "positionAmt": "0",
                "entryPrice": "0.0",
                "markPrice": "2.5",
                "unRealizedProfit": "0.0",
                "liquidationPrice": "0"
            }])
            .to_string(),
        )
        .create_async()
        .await;
    let klines = mock_klines(&mut server, klines_payload(&[])).await;

    let mut scheduler = scheduler(&server);
    assert!(matches!(
        scheduler.run_tick().await.unwrap(),
        TickOutcome::NoEntry
    ));
    // evaluation went ahead and fetched candles
    klines.assert_async().await;
}

#[tokio::test]
async fn test_short_candle_series_skips_tick() {
    let mut server = mockito::Server::new_async().await;
    let _time = mock_time(&mut server).await;
    let _flat = mock_no_position(&mut server).await;

    // 4 raw rows -> 3 closed candles, below the 5 the fractal window needs
    let rows: Vec<Value> = (0..4)
        .map(|i| kline_row(i, 100.0 + i as f64, 100.5 + i as f64, 99.5 + i as f64))
        .collect();
    let _klines = mock_klines(&mut server, json!(rows).to_string()).await;

    let mut scheduler = scheduler(&server);
    assert!(matches!(
        scheduler.run_tick().await.unwrap(),
        TickOutcome::NoEntry
    ));
}

#[tokio::test]
async fn test_upstream_failure_aborts_tick() {
    let mut server = mockito::Server::new_async().await;
    let _time = mock_time(&mut server).await;
    let _flat = mock_no_position(&mut server).await;
    let _klines = server
        .mock("GET", "/fapi/v1/klines")
        .match_query(mockito::Matcher::Any)
        .with_status(502)
        .create_async()
        .await;

    let mut scheduler = scheduler(&server);
    let err = scheduler.run_tick().await.unwrap_err();
    assert!(matches!(err, fractalbot::BotError::Upstream(_)));
}
