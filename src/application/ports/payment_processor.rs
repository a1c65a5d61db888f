use async_trait::async_trait;
use serde::Serialize;

use crate::app_error::AppResult;

// ============================================================================
// Port Types - Provider-agnostic domain types
// ============================================================================

macro_rules! processor_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

processor_id!(
    /// Unique identifier for a customer in the payment processor
    CustomerId
);
processor_id!(
    /// Unique identifier for a subscription in the payment processor
    SubscriptionId
);
processor_id!(
    /// Unique identifier for an invoice in the payment processor
    InvoiceId
);
processor_id!(
    /// Unique identifier for a payment intent in the payment processor
    PaymentIntentId
);

/// Request-scoped idempotency key. Each remote step derives its own key from it so a
/// resubmission with the same request key resolves to the same remote objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdempotencyKey {
    key: String,
    caller_supplied: bool,
}

impl IdempotencyKey {
    /// Key supplied by the caller (e.g. the `Idempotency-Key` request header).
    pub fn from_caller(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            caller_supplied: true,
        }
    }

    /// Fresh key for a request that did not supply one.
    pub fn generate() -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            caller_supplied: false,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.key
    }

    pub fn is_caller_supplied(&self) -> bool {
        self.caller_supplied
    }

    pub fn for_step(&self, step: WorkflowStep) -> String {
        format!("{}:{}", self.key, step.as_ref())
    }
}

/// The remote calls making up one bank-transfer subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::AsRefStr, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum WorkflowStep {
    CreateCustomer,
    CreateSubscription,
    FinalizeInvoice,
    AttachBankTransfer,
    ConfirmPaymentIntent,
}

#[derive(Debug, Clone)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
}

/// Invoice-collected subscription that tolerates an incomplete first payment.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub customer_id: CustomerId,
    pub price_id: String,
    pub days_until_due: u32,
}

#[derive(Debug, Clone)]
pub struct CreatedSubscription {
    pub id: SubscriptionId,
    pub status: String,
    pub latest_invoice: Option<InvoiceId>,
}

#[derive(Debug, Clone)]
pub struct FinalizedInvoice {
    pub id: InvoiceId,
    pub payment_intent: Option<PaymentIntentId>,
}

/// Billing details attached to the payment intent as a bank-transfer payment method.
#[derive(Debug, Clone)]
pub struct BankTransferDetails {
    pub name: String,
    pub email: String,
    pub bank: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmedPaymentIntent {
    pub id: PaymentIntentId,
    pub status: String,
    /// Hosted page telling the payer how to complete the transfer
    pub bank_instructions_url: Option<String>,
}

// ============================================================================
// Port Trait
// ============================================================================

/// Operations the subscription workflow needs from a payment processor.
///
/// Mutating calls take a per-step idempotency key; implementations must make a repeated
/// call with the same key return the original result instead of creating a new object.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_customer(
        &self,
        customer: &NewCustomer,
        idempotency_key: &str,
    ) -> AppResult<CustomerId>;

    async fn create_subscription(
        &self,
        subscription: &NewSubscription,
        idempotency_key: &str,
    ) -> AppResult<CreatedSubscription>;

    /// Finalizes a draft invoice, returning it with its payment intent.
    async fn finalize_invoice(
        &self,
        invoice_id: &InvoiceId,
        idempotency_key: &str,
    ) -> AppResult<FinalizedInvoice>;

    async fn attach_bank_transfer(
        &self,
        payment_intent_id: &PaymentIntentId,
        details: &BankTransferDetails,
        idempotency_key: &str,
    ) -> AppResult<()>;

    async fn confirm_payment_intent(
        &self,
        payment_intent_id: &PaymentIntentId,
        idempotency_key: &str,
    ) -> AppResult<ConfirmedPaymentIntent>;

    /// Retrieves a subscription with its latest invoice and that invoice's payment intent
    /// expanded, in the processor's native JSON shape.
    async fn retrieve_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<serde_json::Value>;

    async fn cancel_subscription(&self, subscription_id: &SubscriptionId) -> AppResult<()>;

    async fn delete_customer(&self, customer_id: &CustomerId) -> AppResult<()>;
}
