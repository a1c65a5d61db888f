use std::sync::Arc;

use crate::{
    application::use_cases::{subscription::SubscriptionUseCases, webhook::WebhookUseCases},
    infra::config::AppConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub subscription_use_cases: Arc<SubscriptionUseCases>,
    pub webhook_use_cases: Arc<WebhookUseCases>,
}
