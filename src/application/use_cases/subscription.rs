use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};
use url::Url;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        ports::payment_processor::{
            BankTransferDetails, CustomerId, IdempotencyKey, NewCustomer, NewSubscription,
            PaymentProcessor, SubscriptionId, WorkflowStep,
        },
        validators::{
            is_valid_bank_code, is_valid_email, is_valid_idempotency_key, is_valid_name,
            is_valid_object_id,
        },
    },
};

// ============================================================================
// Input / Output Types
// ============================================================================

/// Raw form submission. Fields are optional so a missing one is reported by name.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionSignup {
    pub name: Option<String>,
    pub email: Option<String>,
    pub bank: Option<String>,
}

#[derive(Debug, Clone)]
struct ValidatedSignup {
    name: String,
    email: String,
    bank: String,
}

impl SubscriptionSignup {
    fn validate(self) -> AppResult<ValidatedSignup> {
        let name = required("name", self.name)?;
        if !is_valid_name(&name) {
            return Err(AppError::validation("name", "must be 1-200 characters"));
        }

        let email = required("email", self.email)?;
        if !is_valid_email(&email) {
            return Err(AppError::validation("email", "must be a valid email address"));
        }

        let bank = required("bank", self.bank)?;
        if !is_valid_bank_code(&bank) {
            return Err(AppError::validation(
                "bank",
                "must be a bank code of lowercase letters, digits or underscores",
            ));
        }

        Ok(ValidatedSignup {
            name: name.trim().to_string(),
            email: email.trim().to_string(),
            bank,
        })
    }
}

fn required(field: &'static str, value: Option<String>) -> AppResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(AppError::validation(field, "is required")),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BankTransferSubscription {
    pub sub_id: String,
    pub bank_instructions_url: String,
}

/// Remote objects created so far, for rollback.
#[derive(Debug, Default)]
struct CreatedObjects {
    customer: Option<CustomerId>,
    subscription: Option<SubscriptionId>,
}

// ============================================================================
// Use Cases
// ============================================================================

pub struct SubscriptionUseCases {
    processor: Arc<dyn PaymentProcessor>,
    price_id: String,
    days_until_due: u32,
}

impl SubscriptionUseCases {
    pub fn new(processor: Arc<dyn PaymentProcessor>, price_id: String, days_until_due: u32) -> Self {
        Self {
            processor,
            price_id,
            days_until_due,
        }
    }

    /// Parses an optional caller-supplied idempotency key.
    pub fn idempotency_key(raw: Option<&str>) -> AppResult<IdempotencyKey> {
        match raw {
            None => Ok(IdempotencyKey::generate()),
            Some(key) if is_valid_idempotency_key(key) => Ok(IdempotencyKey::from_caller(key)),
            Some(_) => Err(AppError::validation(
                "Idempotency-Key",
                "must be 1-200 visible ASCII characters",
            )),
        }
    }

    /// Customer, subscription, invoice finalization, bank-transfer payment method, confirm.
    ///
    /// On failure after the customer exists, created objects are rolled back unless the
    /// failure is retryable and the caller owns the idempotency key (a resubmission with that
    /// key resumes the same objects).
    #[instrument(skip(self, signup, key), fields(idempotency_key = %key.as_str()))]
    pub async fn create_bank_transfer_subscription(
        &self,
        signup: SubscriptionSignup,
        key: &IdempotencyKey,
    ) -> AppResult<BankTransferSubscription> {
        let signup = signup.validate()?;
        let mut created = CreatedObjects::default();

        match self.run_workflow(&signup, key, &mut created).await {
            Ok(result) => Ok(result),
            Err(err) => {
                if err.is_retryable() && key.is_caller_supplied() {
                    warn!(error = %err, "Subscription workflow failed; left resumable for caller key");
                } else {
                    self.roll_back(&created).await;
                }
                Err(err)
            }
        }
    }

    async fn run_workflow(
        &self,
        signup: &ValidatedSignup,
        key: &IdempotencyKey,
        created: &mut CreatedObjects,
    ) -> AppResult<BankTransferSubscription> {
        let customer_id = self
            .processor
            .create_customer(
                &NewCustomer {
                    name: signup.name.clone(),
                    email: signup.email.clone(),
                },
                &key.for_step(WorkflowStep::CreateCustomer),
            )
            .await?;
        created.customer = Some(customer_id.clone());

        let subscription = self
            .processor
            .create_subscription(
                &NewSubscription {
                    customer_id: customer_id.clone(),
                    price_id: self.price_id.clone(),
                    days_until_due: self.days_until_due,
                },
                &key.for_step(WorkflowStep::CreateSubscription),
            )
            .await?;
        if key.is_caller_supplied() {
            self.ensure_not_rolled_back(&subscription.id, created).await?;
        }
        created.subscription = Some(subscription.id.clone());
        info!(
            customer_id = %customer_id,
            subscription_id = %subscription.id,
            status = %subscription.status,
            "Subscription created"
        );

        let invoice_id = subscription.latest_invoice.ok_or_else(|| {
            AppError::UnexpectedResponse("subscription has no latest invoice".into())
        })?;

        let invoice = self
            .processor
            .finalize_invoice(&invoice_id, &key.for_step(WorkflowStep::FinalizeInvoice))
            .await?;

        let payment_intent_id = invoice.payment_intent.ok_or_else(|| {
            AppError::UnexpectedResponse("finalized invoice has no payment intent".into())
        })?;

        self.processor
            .attach_bank_transfer(
                &payment_intent_id,
                &BankTransferDetails {
                    name: signup.name.clone(),
                    email: signup.email.clone(),
                    bank: signup.bank.clone(),
                },
                &key.for_step(WorkflowStep::AttachBankTransfer),
            )
            .await?;

        let intent = self
            .processor
            .confirm_payment_intent(
                &payment_intent_id,
                &key.for_step(WorkflowStep::ConfirmPaymentIntent),
            )
            .await?;
        info!(
            invoice_id = %invoice.id,
            payment_intent_id = %intent.id,
            status = %intent.status,
            "Payment intent confirmed"
        );

        let url = intent.bank_instructions_url.ok_or_else(|| {
            AppError::UnexpectedResponse("confirmed payment intent has no bank instructions".into())
        })?;

        Ok(BankTransferSubscription {
            sub_id: subscription.id.to_string(),
            bank_instructions_url: well_formed_url(&url)?,
        })
    }

    /// A caller key replays the original processor responses, including after a rollback.
    /// A canceled subscription means that key's objects are gone and it must not be reused.
    async fn ensure_not_rolled_back(
        &self,
        subscription_id: &SubscriptionId,
        created: &mut CreatedObjects,
    ) -> AppResult<()> {
        let current = self.processor.retrieve_subscription(subscription_id).await?;
        if current.get("status").and_then(|s| s.as_str()) != Some("canceled") {
            return Ok(());
        }

        warn!(
            subscription_id = %subscription_id,
            "Idempotency key reused after its subscription was rolled back"
        );
        // Already rolled back by the earlier run.
        *created = CreatedObjects::default();
        Err(AppError::validation(
            "Idempotency-Key",
            "belongs to a submission that failed; retry with a new key",
        ))
    }

    async fn roll_back(&self, created: &CreatedObjects) {
        if let Some(subscription_id) = &created.subscription {
            match self.processor.cancel_subscription(subscription_id).await {
                Ok(()) => info!(subscription_id = %subscription_id, "Rolled back subscription"),
                Err(e) => warn!(
                    error = %e,
                    subscription_id = %subscription_id,
                    "Failed to roll back subscription"
                ),
            }
        }

        if let Some(customer_id) = &created.customer {
            match self.processor.delete_customer(customer_id).await {
                Ok(()) => info!(customer_id = %customer_id, "Rolled back customer"),
                Err(e) => warn!(error = %e, customer_id = %customer_id, "Failed to roll back customer"),
            }
        }
    }

    /// Subscription with latest invoice and payment intent expanded, as the processor returns it.
    #[instrument(skip(self))]
    pub async fn get_subscription(&self, sub_id: &str) -> AppResult<serde_json::Value> {
        if !is_valid_object_id(sub_id) {
            return Err(AppError::validation(
                "sub_id",
                "must be 1-255 ASCII letters, digits or underscores",
            ));
        }

        self.processor
            .retrieve_subscription(&SubscriptionId::new(sub_id))
            .await
    }
}

fn well_formed_url(raw: &str) -> AppResult<String> {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "https" | "http") && url.has_host() => Ok(url.into()),
        _ => Err(AppError::UnexpectedResponse(
            "bank instructions URL is not a valid http(s) URL".into(),
        )),
    }
}
