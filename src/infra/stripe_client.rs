use reqwest::{Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::app_error::{AppError, AppResult};
use crate::infra::retry::{RetryConfig, Retryable, with_retry};

pub const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

#[derive(Clone)]
pub struct StripeClient {
    client: Client,
    secret_key: SecretString,
    api_base: String,
    api_version: Option<String>,
    retry: RetryConfig,
}

impl StripeClient {
    pub fn new(client: Client, secret_key: SecretString, api_base: &str) -> Self {
        Self {
            client,
            secret_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_version: None,
            retry: RetryConfig::default(),
        }
    }

    /// Pin the `Stripe-Version` sent with every request.
    #[must_use]
    pub fn with_api_version(mut self, version: Option<String>) -> Self {
        self.api_version = version;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn auth_header(&self) -> String {
        use base64::Engine;
        let encoded = base64::engine::general_purpose::STANDARD
            .encode(format!("{}:", self.secret_key.expose_secret()));
        format!("Basic {}", encoded)
    }

    // ========================================================================
    // Customers
    // ========================================================================

    pub async fn create_customer(
        &self,
        name: &str,
        email: &str,
        idempotency_key: &str,
    ) -> AppResult<StripeCustomer> {
        let params = vec![
            ("name".to_string(), name.to_string()),
            ("email".to_string(), email.to_string()),
        ];

        self.request(Method::POST, "/customers", &[], &params, Some(idempotency_key))
            .await
    }

    pub async fn delete_customer(&self, customer_id: &str) -> AppResult<StripeDeleted> {
        self.request(
            Method::DELETE,
            &format!("/customers/{}", customer_id),
            &[],
            &[],
            None,
        )
        .await
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Creates an invoice-collected subscription whose first payment may stay incomplete.
    pub async fn create_subscription(
        &self,
        customer_id: &str,
        price_id: &str,
        days_until_due: u32,
        idempotency_key: &str,
    ) -> AppResult<StripeSubscription> {
        let params = vec![
            ("customer".to_string(), customer_id.to_string()),
            ("items[0][price]".to_string(), price_id.to_string()),
            ("collection_method".to_string(), "send_invoice".to_string()),
            ("days_until_due".to_string(), days_until_due.to_string()),
            ("payment_behavior".to_string(), "allow_incomplete".to_string()),
        ];

        self.request(Method::POST, "/subscriptions", &[], &params, Some(idempotency_key))
            .await
    }

    /// Retrieves a subscription with its latest invoice and payment intent expanded,
    /// returned in Stripe's native shape.
    pub async fn get_subscription_expanded(
        &self,
        subscription_id: &str,
    ) -> AppResult<serde_json::Value> {
        let query = [
            ("expand[]", "latest_invoice"),
            ("expand[]", "latest_invoice.payment_intent"),
        ];

        self.request(
            Method::GET,
            &format!("/subscriptions/{}", subscription_id),
            &query,
            &[],
            None,
        )
        .await
    }

    /// Cancels immediately.
    pub async fn cancel_subscription(&self, subscription_id: &str) -> AppResult<StripeSubscription> {
        self.request(
            Method::DELETE,
            &format!("/subscriptions/{}", subscription_id),
            &[],
            &[],
            None,
        )
        .await
    }

    // ========================================================================
    // Invoices
    // ========================================================================

    pub async fn finalize_invoice(
        &self,
        invoice_id: &str,
        idempotency_key: &str,
    ) -> AppResult<StripeInvoice> {
        let params = vec![("expand[]".to_string(), "payment_intent".to_string())];

        self.request(
            Method::POST,
            &format!("/invoices/{}/finalize", invoice_id),
            &[],
            &params,
            Some(idempotency_key),
        )
        .await
    }

    // ========================================================================
    // Payment Intents
    // ========================================================================

    /// Attaches an `id_bank_transfer` payment method built from billing details.
    pub async fn attach_bank_transfer(
        &self,
        payment_intent_id: &str,
        name: &str,
        email: &str,
        bank: &str,
        idempotency_key: &str,
    ) -> AppResult<StripePaymentIntent> {
        let params = vec![
            ("payment_method_data[type]".to_string(), "id_bank_transfer".to_string()),
            (
                "payment_method_data[billing_details][email]".to_string(),
                email.to_string(),
            ),
            (
                "payment_method_data[billing_details][name]".to_string(),
                name.to_string(),
            ),
            (
                "payment_method_data[id_bank_transfer][bank]".to_string(),
                bank.to_string(),
            ),
        ];

        self.request(
            Method::POST,
            &format!("/payment_intents/{}", payment_intent_id),
            &[],
            &params,
            Some(idempotency_key),
        )
        .await
    }

    pub async fn confirm_payment_intent(
        &self,
        payment_intent_id: &str,
        idempotency_key: &str,
    ) -> AppResult<StripePaymentIntent> {
        self.request(
            Method::POST,
            &format!("/payment_intents/{}/confirm", payment_intent_id),
            &[],
            &[],
            Some(idempotency_key),
        )
        .await
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    /// Sends a request, retrying transient failures. Mutating requests must carry an
    /// idempotency key so a retry cannot create a second object.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> AppResult<T> {
        let url = format!("{}{}", self.api_base, path);
        let url = url.as_str();
        let operation = format!("{} {}", method, path);

        with_retry(&self.retry, &operation, || {
            self.send_once(method.clone(), url, query, params, idempotency_key)
        })
        .await
        .map_err(|failure| failure.error)
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        query: &[(&str, &str)],
        params: &[(String, String)],
        idempotency_key: Option<&str>,
    ) -> Result<T, StripeFailure> {
        let mut builder = self
            .client
            .request(method, url)
            .header("Authorization", self.auth_header());

        if !query.is_empty() {
            builder = builder.query(query);
        }
        if !params.is_empty() {
            builder = builder.form(params);
        }
        if let Some(key) = idempotency_key {
            builder = builder.header("Idempotency-Key", key);
        }
        if let Some(version) = &self.api_version {
            builder = builder.header("Stripe-Version", version);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StripeFailure::from(map_transport_error(e)))?;

        self.handle_response(response).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, StripeFailure> {
        let status = response.status();
        let should_retry = response
            .headers()
            .get(SHOULD_RETRY_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<bool>().ok());
        let body = response.text().await.map_err(|e| {
            StripeFailure::from(AppError::ProcessorUnavailable(format!(
                "Failed to read response: {}",
                e
            )))
        })?;

        if !status.is_success() {
            let error = serde_json::from_str::<StripeErrorResponse>(&body)
                .map(|e| e.error)
                .ok();
            tracing::error!(
                status = %status,
                error_type = error.as_ref().map(|e| e.error_type.as_str()),
                error_code = error.as_ref().and_then(|e| e.code.as_deref()),
                should_retry,
                "Stripe API error"
            );
            return Err(StripeFailure {
                error: map_stripe_error(status, error),
                should_retry,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            tracing::error!(error = %e, "Failed to parse Stripe response");
            StripeFailure::from(AppError::UnexpectedResponse(format!(
                "Failed to parse Stripe response: {}",
                e
            )))
        })
    }
}

const SHOULD_RETRY_HEADER: &str = "stripe-should-retry";

/// A failed attempt plus Stripe's retry advice. `Stripe-Should-Retry`, when present, overrides
/// the status-based classification.
#[derive(Debug)]
struct StripeFailure {
    error: AppError,
    should_retry: Option<bool>,
}

impl From<AppError> for StripeFailure {
    fn from(error: AppError) -> Self {
        Self {
            error,
            should_retry: None,
        }
    }
}

impl std::fmt::Display for StripeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl Retryable for StripeFailure {
    fn is_retryable(&self) -> bool {
        self.should_retry
            .unwrap_or_else(|| self.error.is_retryable())
    }
}

fn map_transport_error(e: reqwest::Error) -> AppError {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        AppError::ProcessorUnavailable(format!("Stripe request failed: {}", e))
    } else {
        AppError::Internal(format!("Stripe request failed: {}", e))
    }
}

/// Classifies a non-success Stripe response into the application error taxonomy.
pub fn map_stripe_error(status: StatusCode, error: Option<StripeError>) -> AppError {
    let message = error
        .as_ref()
        .and_then(|e| e.message.clone())
        .unwrap_or_else(|| format!("Stripe API error: {}", status));

    if status == StatusCode::TOO_MANY_REQUESTS {
        return AppError::RateLimited;
    }
    if status.is_server_error() {
        return AppError::ProcessorUnavailable(message);
    }
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return AppError::Internal(format!("Stripe rejected credentials: {}", message));
    }

    let Some(error) = error else {
        return AppError::ProcessorRejected {
            code: None,
            message,
        };
    };

    if error.error_type == "card_error" || error.decline_code.is_some() {
        return AppError::PaymentDeclined(message);
    }
    if status == StatusCode::NOT_FOUND || error.code.as_deref() == Some("resource_missing") {
        return AppError::NotFound;
    }

    AppError::ProcessorRejected {
        code: error.code,
        message,
    }
}

// ============================================================================
// Stripe Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct StripeCustomer {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeDeleted {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub status: String,
    pub latest_invoice: Option<StripeExpandable<StripeInvoice>>,
}

/// A field Stripe returns either as an id or, when expanded, as the full object.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StripeExpandable<T> {
    Id(String),
    Object(Box<T>),
}

impl StripeExpandable<StripeInvoice> {
    pub fn id(&self) -> &str {
        match self {
            StripeExpandable::Id(id) => id,
            StripeExpandable::Object(invoice) => &invoice.id,
        }
    }
}

impl StripeExpandable<StripePaymentIntent> {
    pub fn id(&self) -> &str {
        match self {
            StripeExpandable::Id(id) => id,
            StripeExpandable::Object(intent) => &intent.id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub payment_intent: Option<StripeExpandable<StripePaymentIntent>>,
}

#[derive(Debug, Deserialize)]
pub struct StripePaymentIntent {
    pub id: String,
    pub status: String,
    pub next_action: Option<StripeNextAction>,
}

impl StripePaymentIntent {
    /// Hosted bank-transfer instructions URL from the first financial address, falling back
    /// to the instructions-level URL.
    pub fn bank_instructions_url(&self) -> Option<&str> {
        let instructions = self
            .next_action
            .as_ref()?
            .display_bank_transfer_instructions
            .as_ref()?;

        instructions
            .financial_addresses
            .first()
            .and_then(|address| address.id_bban.as_ref())
            .and_then(|bban| bban.hosted_instructions_url.as_deref())
            .or(instructions.hosted_instructions_url.as_deref())
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeNextAction {
    pub display_bank_transfer_instructions: Option<StripeBankTransferInstructions>,
}

#[derive(Debug, Deserialize)]
pub struct StripeBankTransferInstructions {
    pub hosted_instructions_url: Option<String>,
    #[serde(default)]
    pub financial_addresses: Vec<StripeFinancialAddress>,
}

#[derive(Debug, Deserialize)]
pub struct StripeFinancialAddress {
    pub id_bban: Option<StripeIdBban>,
}

#[derive(Debug, Deserialize)]
pub struct StripeIdBban {
    pub hosted_instructions_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeErrorResponse {
    pub error: StripeError,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StripeError {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: Option<String>,
    pub code: Option<String>,
    pub decline_code: Option<String>,
}
