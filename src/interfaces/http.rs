//! Axum HTTP read API (spec §4.H/§6): `/api/v1/healthz`, `/prices`,
//! `/prices/providers/{tvwap,vwap}`, `/metrics`. Grounded on the pack's
//! `cooprefr-bettersys` `AppState`-plus-`Router` composition. Every handler
//! only reads from [`PriceStore`]/[`Metrics`]; nothing here ever writes.

use crate::application::price_store::PriceStore;
use crate::domain::types::{CurrencyPairDec, CurrencyPairDecByProvider};
use crate::infrastructure::observability::Metrics;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<PriceStore>,
    pub metrics: Arc<Metrics>,
    /// "Recent enough" window for `/healthz`, in milliseconds: spec §6 leaves
    /// this undefined, resolved here as `2 * provider_timeout` (§4.H).
    pub liveness_window_ms: i64,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/healthz", get(healthz))
        .route("/api/v1/prices", get(prices))
        .route("/api/v1/prices/providers/tvwap", get(tvwap_prices))
        .route("/api/v1/prices/providers/vwap", get(vwap_prices))
        .route("/api/v1/metrics", get(metrics))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthzResponse {
    status: &'static str,
}

async fn healthz(State(state): State<AppState>) -> Response {
    let now_ms = chrono::Utc::now().timestamp_millis();
    let age = now_ms - state.store.last_tick_at_ms();
    if state.store.last_tick_at_ms() > 0 && age <= state.liveness_window_ms {
        (StatusCode::OK, Json(HealthzResponse { status: "available" })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthzResponse { status: "unavailable" }),
        )
            .into_response()
    }
}

#[derive(Serialize, Deserialize)]
struct PricesResponse {
    prices: HashMap<String, String>,
}

fn to_symbol_map(prices: &CurrencyPairDec) -> HashMap<String, String> {
    prices
        .iter()
        .map(|(pair, price)| (pair.symbol(), price.to_string()))
        .collect()
}

async fn prices(State(state): State<AppState>) -> Json<PricesResponse> {
    Json(PricesResponse {
        prices: to_symbol_map(&state.store.get_prices()),
    })
}

#[derive(Serialize)]
struct ProviderPricesResponse {
    #[serde(flatten)]
    by_provider: HashMap<String, HashMap<String, String>>,
}

fn to_provider_symbol_map(by_provider: &CurrencyPairDecByProvider) -> HashMap<String, HashMap<String, String>> {
    by_provider
        .iter()
        .map(|(provider, prices)| (provider.clone(), to_symbol_map(prices)))
        .collect()
}

async fn tvwap_prices(State(state): State<AppState>) -> Json<ProviderPricesResponse> {
    Json(ProviderPricesResponse {
        by_provider: to_provider_symbol_map(&state.store.get_tvwap_prices()),
    })
}

async fn vwap_prices(State(state): State<AppState>) -> Json<ProviderPricesResponse> {
    Json(ProviderPricesResponse {
        by_provider: to_provider_symbol_map(&state.store.get_vwap_prices()),
    })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::CurrencyPair;
    use axum::body::Body;
    use axum::http::Request;
    use rust_decimal_macros::dec;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            store: Arc::new(PriceStore::new()),
            metrics: Arc::new(Metrics::new().unwrap()),
            liveness_window_ms: 4_000,
        }
    }

    #[tokio::test]
    async fn healthz_reports_unavailable_before_first_tick() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/api/v1/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn healthz_reports_available_after_a_fresh_tick() {
        let state = test_state();
        state.store.publish(
            CurrencyPairDec::new(),
            CurrencyPairDecByProvider::new(),
            CurrencyPairDecByProvider::new(),
            chrono::Utc::now().timestamp_millis(),
        );
        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/api/v1/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn prices_endpoint_serializes_symbol_keyed_decimals() {
        let state = test_state();
        let mut prices = CurrencyPairDec::new();
        prices.insert(CurrencyPair::new("ATOM", "USD"), dec!(40.13));
        state.store.publish(prices, CurrencyPairDecByProvider::new(), CurrencyPairDecByProvider::new(), 1);

        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/api/v1/prices").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: PricesResponse = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.prices.get("ATOMUSD").unwrap(), "40.13");
    }

    #[tokio::test]
    async fn metrics_endpoint_renders_prometheus_text() {
        let app = router(test_state());
        let response = app
            .oneshot(Request::builder().uri("/api/v1/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8(bytes.to_vec()).unwrap().contains("oraclefeeder_"));
    }
}
