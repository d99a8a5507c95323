use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::{Datelike, Utc};
use common::error::RecapError;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::recap::WalletRecapper;

#[derive(Debug, Deserialize)]
pub struct RecapQuery {
    pub year: Option<i32>,
}

pub fn current_year() -> i32 {
    Utc::now().year()
}

fn status_for(err: &RecapError) -> StatusCode {
    match err {
        RecapError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
        RecapError::Unavailable => StatusCode::BAD_GATEWAY,
        RecapError::MissingCredential(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: &RecapError) -> Response {
    let body = Json(json!({ "error": err.to_string(), "kind": err.kind() }));
    (status_for(err), body).into_response()
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn wallet_recap<R: WalletRecapper>(
    State(recapper): State<Arc<R>>,
    Path(address): Path<String>,
    Query(query): Query<RecapQuery>,
) -> Response {
    let year = query.year.unwrap_or_else(current_year);
    match recapper.get_wallet_recap(&address, year).await {
        Ok(recap) => Json(recap).into_response(),
        Err(e) => error_response(&e),
    }
}

pub fn router<R: WalletRecapper>(recapper: Arc<R>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/wallet/{address}", get(wallet_recap::<R>))
        .layer(TraceLayer::new_for_http())
        .with_state(recapper)
}
