//! Binance `PriceProvider` adapter: a websocket trade stream feeds an
//! in-memory ticker cache, and a periodic REST kline poll feeds a
//! 10-minute candle buffer. Adapted from the teacher's
//! `BinanceWebSocketManager`/`BinanceMarketDataService` reconnect-with-backoff
//! and builder patterns.

use crate::domain::ports::PriceProvider;
use crate::domain::types::{CandlePrice, CurrencyPair, TickerPrice};
use crate::infrastructure::core::http_client_factory::HttpClientFactory;
use crate::infrastructure::observability::Metrics;
use crate::kernel::tvwap::WINDOW_MS;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::RwLock;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

const CANDLE_POLL_INTERVAL_SECS: u64 = 60;

type TickerMap = HashMap<CurrencyPair, TickerPrice>;
type CandleMap = HashMap<CurrencyPair, Vec<CandlePrice>>;

/// The concatenated symbol Binance expects, e.g. `ATOM`/`USDT` -> `ATOMUSDT`.
fn binance_symbol(pair: &CurrencyPair) -> String {
    format!("{}{}", pair.base, pair.quote)
}

pub struct BinanceProvider {
    rest_client: ClientWithMiddleware,
    rest_base_url: String,
    ws_url: String,
    metrics: Arc<Metrics>,

    subscribed: RwLock<Vec<CurrencyPair>>,
    tickers: Arc<StdRwLock<TickerMap>>,
    candles: Arc<StdRwLock<CandleMap>>,
    ws_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    poll_task: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl BinanceProvider {
    pub fn new(rest_base_url: String, ws_url: String, metrics: Arc<Metrics>) -> Self {
        Self {
            rest_client: HttpClientFactory::create_client(),
            rest_base_url,
            ws_url,
            metrics,
            subscribed: RwLock::new(Vec::new()),
            tickers: Arc::new(StdRwLock::new(HashMap::new())),
            candles: Arc::new(StdRwLock::new(HashMap::new())),
            ws_task: tokio::sync::Mutex::new(None),
            poll_task: tokio::sync::Mutex::new(None),
        }
    }

    async fn respawn(&self, pairs: Vec<CurrencyPair>) {
        self.respawn_websocket(pairs.clone()).await;
        self.respawn_candle_poller(pairs).await;
    }

    async fn respawn_websocket(&self, pairs: Vec<CurrencyPair>) {
        let mut guard = self.ws_task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        if pairs.is_empty() {
            return;
        }

        let ws_url = self.ws_url.clone();
        let tickers = self.tickers.clone();
        let metrics = self.metrics.clone();

        *guard = Some(tokio::spawn(async move {
            run_websocket("binance", ws_url, pairs, tickers, metrics).await;
        }));
    }

    async fn respawn_candle_poller(&self, pairs: Vec<CurrencyPair>) {
        let mut guard = self.poll_task.lock().await;
        if let Some(handle) = guard.take() {
            handle.abort();
        }
        if pairs.is_empty() {
            return;
        }

        let client = self.rest_client.clone();
        let base_url = self.rest_base_url.clone();
        let candles = self.candles.clone();

        *guard = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(
                CANDLE_POLL_INTERVAL_SECS,
            ));
            loop {
                interval.tick().await;
                for pair in &pairs {
                    if let Err(e) = poll_klines(&client, &base_url, pair, &candles).await {
                        warn!(
                            "BinanceProvider: kline poll failed for {}: {e}",
                            pair.symbol()
                        );
                    }
                }
            }
        }));
    }
}

#[async_trait]
impl PriceProvider for BinanceProvider {
    async fn start_connections(&self) -> Result<()> {
        let pairs = self.subscribed.read().await.clone();
        self.respawn(pairs).await;
        Ok(())
    }

    async fn subscribe_currency_pairs(&self, pairs: &[CurrencyPair]) -> Result<()> {
        let mut subscribed = self.subscribed.write().await;
        let mut changed = false;
        for pair in pairs {
            if !subscribed.contains(pair) {
                subscribed.push(pair.clone());
                changed = true;
            }
        }
        let snapshot = subscribed.clone();
        drop(subscribed);

        if changed {
            self.respawn(snapshot).await;
        }
        Ok(())
    }

    async fn get_ticker_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<CurrencyPair, TickerPrice>> {
        let cache = match self.tickers.read() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        Ok(pairs
            .iter()
            .filter_map(|p| cache.get(p).map(|t| (p.clone(), *t)))
            .collect())
    }

    async fn get_candle_prices(
        &self,
        pairs: &[CurrencyPair],
    ) -> Result<HashMap<CurrencyPair, Vec<CandlePrice>>> {
        let cache = match self.candles.read() {
            Ok(g) => g,
            Err(p) => p.into_inner(),
        };
        Ok(pairs
            .iter()
            .filter_map(|p| cache.get(p).map(|c| (p.clone(), c.clone())))
            .collect())
    }
}

async fn run_websocket(
    provider_name: &str,
    ws_url: String,
    pairs: Vec<CurrencyPair>,
    tickers: Arc<StdRwLock<TickerMap>>,
    metrics: Arc<Metrics>,
) {
    let mut backoff = 1u64;
    const MAX_BACKOFF: u64 = 60;

    loop {
        match connect_and_stream(&ws_url, &pairs, &tickers).await {
            Ok(()) => {
                info!("BinanceProvider: websocket closed gracefully");
                tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                backoff = 1;
            }
            Err(e) => {
                warn!("BinanceProvider: websocket error: {e}. Reconnecting in {backoff}s");
                metrics.inc_provider_reconnect(provider_name);
                tokio::time::sleep(tokio::time::Duration::from_secs(backoff)).await;
                backoff = (backoff * 2).min(MAX_BACKOFF);
            }
        }
    }
}

async fn connect_and_stream(
    ws_url: &str,
    pairs: &[CurrencyPair],
    tickers: &Arc<StdRwLock<TickerMap>>,
) -> Result<()> {
    let streams: Vec<String> = pairs
        .iter()
        .map(|p| format!("{}@trade", binance_symbol(p).to_lowercase()))
        .collect();

    let mut url = format!("{}/stream", ws_url.trim_end_matches('/'));
    if !streams.is_empty() {
        url.push_str("?streams=");
        url.push_str(&streams.join("/"));
    }

    info!("BinanceProvider: connecting to {url}");
    let (ws_stream, _) = connect_async(&url)
        .await
        .context("failed to connect to Binance websocket")?;
    let (mut write, mut read) = ws_stream.split();

    let symbol_to_pair: HashMap<String, CurrencyPair> = pairs
        .iter()
        .map(|p| (binance_symbol(p), p.clone()))
        .collect();

    let mut ping_interval = tokio::time::interval(tokio::time::Duration::from_secs(180));

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if write.send(Message::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Err(e) = handle_trade_message(&text, &symbol_to_pair, tickers) {
                            debug!("BinanceProvider: ignoring unparseable message: {e}");
                        }
                    }
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        error!("BinanceProvider: websocket read error: {e}");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

fn handle_trade_message(
    text: &str,
    symbol_to_pair: &HashMap<String, CurrencyPair>,
    tickers: &Arc<StdRwLock<TickerMap>>,
) -> Result<()> {
    #[derive(Deserialize)]
    struct StreamMessage {
        data: TradeData,
    }

    #[derive(Deserialize)]
    struct TradeData {
        #[serde(rename = "s")]
        symbol: String,
        #[serde(rename = "p")]
        price: String,
        #[serde(rename = "q")]
        quantity: String,
    }

    let msg: StreamMessage = serde_json::from_str(text).context("not a trade stream message")?;
    let Some(pair) = symbol_to_pair.get(&msg.data.symbol) else {
        return Ok(());
    };

    let price = Decimal::from_str(&msg.data.price).unwrap_or(Decimal::ZERO);
    let volume = Decimal::from_str(&msg.data.quantity).unwrap_or(Decimal::ZERO);
    if price <= Decimal::ZERO {
        return Ok(());
    }

    let mut guard = match tickers.write() {
        Ok(g) => g,
        Err(p) => p.into_inner(),
    };
    guard.insert(pair.clone(), TickerPrice { price, volume });
    Ok(())
}

async fn poll_klines(
    client: &ClientWithMiddleware,
    base_url: &str,
    pair: &CurrencyPair,
    candles: &Arc<StdRwLock<CandleMap>>,
) -> Result<()> {
    #[derive(Deserialize)]
    struct RawKline(
        i64,    // open time
        String, // open
        String, // high
        String, // low
        String, // close
        String, // volume
        i64,    // close time
    );

    let symbol = binance_symbol(pair);
    let url = format!(
        "{}/api/v3/klines?symbol={}&interval=1m&limit=15",
        base_url.trim_end_matches('/'),
        symbol
    );

    let response = client
        .get(&url)
        .send()
        .await
        .context("kline request failed")?;
    let raw: Vec<RawKline> = response.json().await.context("invalid kline response")?;

    let fresh: Vec<CandlePrice> = raw
        .into_iter()
        .filter_map(|k| {
            let price = Decimal::from_str(&k.4).ok()?;
            let volume = Decimal::from_str(&k.5).ok()?;
            Some(CandlePrice {
                price,
                volume,
                timestamp: k.6,
            })
        })
        .collect();

    if fresh.is_empty() {
        return Ok(());
    }

    let now_ms = fresh.iter().map(|c| c.timestamp).max().unwrap_or(0);
    let mut guard = match candles.write() {
        Ok(g) => g,
        Err(p) => p.into_inner(),
    };
    let entry = guard.entry(pair.clone()).or_default();

    // Overlapping polls re-fetch the same close timestamps; index by
    // timestamp so a repeat poll replaces rather than duplicates a candle.
    let mut by_timestamp: HashMap<i64, CandlePrice> =
        entry.drain(..).map(|c| (c.timestamp, c)).collect();
    for candle in fresh {
        by_timestamp.insert(candle.timestamp, candle);
    }
    entry.extend(by_timestamp.into_values().filter(|c| c.timestamp > now_ms - WINDOW_MS));
    Ok(())
}
