use crate::{
    adapters::http::app_state::AppState,
    application::{
        ports::payment_processor::PaymentProcessor,
        use_cases::{subscription::SubscriptionUseCases, webhook::WebhookUseCases},
    },
    infra::{
        config::AppConfig,
        error::InfraError,
        http_client::try_build_client,
        retry::RetryConfig,
        stripe_client::StripeClient,
        stripe_payment_adapter::StripePaymentAdapter,
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub fn init_app_state(config: AppConfig) -> Result<AppState, InfraError> {
    let http = try_build_client(config.stripe_timeout)?;

    let stripe = StripeClient::new(
        http,
        config.stripe_secret_key.clone(),
        config.stripe_api_base.as_str(),
    )
    .with_api_version(config.stripe_api_version.clone())
    .with_retry(RetryConfig::default().with_max_retries(config.stripe_max_retries));

    let processor = Arc::new(StripePaymentAdapter::new(stripe)) as Arc<dyn PaymentProcessor>;

    let subscription_use_cases =
        SubscriptionUseCases::new(processor, config.price_id.clone(), config.days_until_due);

    let webhook_use_cases = WebhookUseCases::new(
        config.stripe_webhook_secret.clone(),
        config.webhook_tolerance_secs,
    );

    info!(mode = config.payment_mode.as_str(), "Stripe configured");
    if config.payment_mode.is_production() {
        warn!("Using a live Stripe key - subscriptions will create real charges");
    }
    if !webhook_use_cases.verifies_signatures() {
        warn!("STRIPE_WEBHOOK_SECRET not set - webhook payloads will NOT be verified");
    }

    Ok(AppState {
        config: Arc::new(config),
        subscription_use_cases: Arc::new(subscription_use_cases),
        webhook_use_cases: Arc::new(webhook_use_cases),
    })
}

pub fn init_tracing(log_file: Option<&std::path::Path>) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "idbank_billing=debug,tower_http=debug".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false) // don't show target (module path)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), only when requested
    let json_layer = log_file.and_then(|path| match File::create(path) {
        Ok(file) => Some(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        ),
        Err(e) => {
            eprintln!("cannot create log file {}: {}", path.display(), e);
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();
}
