//! Read API
//!
//! Serves the latest published [`BookView`]. Handlers only borrow the watch
//! channel; they never reach the engine.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;
use types::numeric::Price;
use types::side::BookSide;

use crate::depth::DisplayRow;
use crate::engine::{BookView, EngineStats};
use crate::price::PriceDirection;
use crate::sequence::SyncState;

pub type ViewState = watch::Receiver<BookView>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
        };

        let body = Json(json!({
            "error": code,
            "message": message
        }));

        (status, body).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DepthQuery {
    /// Rows to return; defaults to the configured depth.
    pub levels: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthResponse {
    pub symbol: String,
    pub side: BookSide,
    pub rows: Vec<DisplayRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub last_price: Option<Price>,
    pub previous_price: Option<Price>,
    pub direction: PriceDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub symbol: String,
    pub sync_state: SyncState,
    pub last_sequence: Option<u64>,
    pub best_ask: Option<Price>,
    pub best_bid: Option<Price>,
    pub spread: Option<Decimal>,
    pub mid_price: Option<Decimal>,
    pub stats: EngineStats,
}

pub fn router(views: ViewState) -> Router {
    Router::new()
        .route("/depth/:side", get(get_depth))
        .route("/price", get(get_price))
        .route("/status", get(get_status))
        .with_state(views)
}

pub async fn get_depth(
    State(views): State<ViewState>,
    Path(side): Path<String>,
    Query(query): Query<DepthQuery>,
) -> Result<Json<DepthResponse>, ApiError> {
    let side: BookSide = side
        .parse()
        .map_err(|e: types::errors::SideError| ApiError::BadRequest(e.to_string()))?;

    let view = views.borrow();
    let levels = query.levels.unwrap_or(view.depth);
    if levels == 0 {
        return Err(ApiError::BadRequest("levels must be at least 1".into()));
    }

    Ok(Json(DepthResponse {
        symbol: view.symbol.clone(),
        side,
        rows: view.display_rows(side, levels),
    }))
}

pub async fn get_price(State(views): State<ViewState>) -> Json<PriceResponse> {
    let view = views.borrow();
    Json(PriceResponse {
        last_price: view.last_price,
        previous_price: view.previous_price,
        direction: view.direction,
    })
}

pub async fn get_status(State(views): State<ViewState>) -> Json<StatusResponse> {
    let view = views.borrow();
    let best_ask = view.asks.first().map(|l| l.price);
    let best_bid = view.bids.first().map(|l| l.price);
    Json(StatusResponse {
        symbol: view.symbol.clone(),
        sync_state: view.sync_state,
        last_sequence: view.last_sequence,
        best_ask,
        best_bid,
        spread: view.spread,
        mid_price: view.mid_price,
        stats: view.stats,
    })
}
