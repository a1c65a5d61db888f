pub mod subscription;
pub mod webhook;

use axum::Router;

use crate::adapters::http::app_state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(subscription::router())
        .merge(webhook::router())
}
