use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::HeaderMap,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;

use crate::{
    adapters::http::app_state::AppState,
    app_error::{AppError, AppResult},
    application::use_cases::subscription::{SubscriptionSignup, SubscriptionUseCases},
};

const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Deserialize)]
struct SubscriptionPayload {
    name: Option<String>,
    email: Option<String>,
    bank: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscription", post(create_subscription))
        .route("/subscription/{sub_id}", get(get_subscription))
}

/// POST /subscription
/// Creates customer, subscription and confirmed bank-transfer payment intent.
async fn create_subscription(
    State(app_state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SubscriptionPayload>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(payload) = payload.map_err(|e| AppError::InvalidInput(e.body_text()))?;

    let raw_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .map(|v| {
            v.to_str().map_err(|_| {
                AppError::validation("Idempotency-Key", "must be visible ASCII characters")
            })
        })
        .transpose()?;
    let key = SubscriptionUseCases::idempotency_key(raw_key)?;

    let created = app_state
        .subscription_use_cases
        .create_bank_transfer_subscription(
            SubscriptionSignup {
                name: payload.name,
                email: payload.email,
                bank: payload.bank,
            },
            &key,
        )
        .await?;

    Ok(Json(created))
}

/// GET /subscription/{sub_id}
/// Read-through to the processor with invoice and payment intent expanded.
async fn get_subscription(
    State(app_state): State<AppState>,
    Path(sub_id): Path<String>,
) -> AppResult<impl IntoResponse> {
    let subscription = app_state
        .subscription_use_cases
        .get_subscription(&sub_id)
        .await?;

    Ok(Json(subscription))
}
