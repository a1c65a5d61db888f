//! In-memory mock of the payment processor port.

use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::{
    app_error::{AppError, AppResult},
    application::ports::payment_processor::{
        BankTransferDetails, ConfirmedPaymentIntent, CreatedSubscription, CustomerId,
        FinalizedInvoice, InvoiceId, NewCustomer, NewSubscription, PaymentIntentId,
        PaymentProcessor, SubscriptionId, WorkflowStep,
    },
};

/// Failure injected at a workflow step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Card-error style decline (402).
    Declined,
    /// Invalid request rejected by the processor.
    Rejected,
    /// Transport failure or processor outage.
    Unavailable,
}

impl FailureKind {
    fn to_error(self, step: WorkflowStep) -> AppError {
        match self {
            FailureKind::Declined => AppError::PaymentDeclined("insufficient_funds".into()),
            FailureKind::Rejected => AppError::ProcessorRejected {
                code: Some("parameter_invalid".into()),
                message: format!("{} rejected", step),
            },
            FailureKind::Unavailable => {
                AppError::ProcessorUnavailable(format!("{} timed out", step))
            }
        }
    }
}

/// A call received by the processor, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorCall {
    CreateCustomer {
        name: String,
        email: String,
        idempotency_key: String,
    },
    CreateSubscription {
        customer_id: String,
        price_id: String,
        days_until_due: u32,
        idempotency_key: String,
    },
    FinalizeInvoice {
        invoice_id: String,
        idempotency_key: String,
    },
    AttachBankTransfer {
        payment_intent_id: String,
        name: String,
        email: String,
        bank: String,
        idempotency_key: String,
    },
    ConfirmPaymentIntent {
        payment_intent_id: String,
        idempotency_key: String,
    },
    RetrieveSubscription {
        subscription_id: String,
    },
    CancelSubscription {
        subscription_id: String,
    },
    DeleteCustomer {
        customer_id: String,
    },
}

impl ProcessorCall {
    pub fn step_name(&self) -> &'static str {
        match self {
            ProcessorCall::CreateCustomer { .. } => "create_customer",
            ProcessorCall::CreateSubscription { .. } => "create_subscription",
            ProcessorCall::FinalizeInvoice { .. } => "finalize_invoice",
            ProcessorCall::AttachBankTransfer { .. } => "attach_bank_transfer",
            ProcessorCall::ConfirmPaymentIntent { .. } => "confirm_payment_intent",
            ProcessorCall::RetrieveSubscription { .. } => "retrieve_subscription",
            ProcessorCall::CancelSubscription { .. } => "cancel_subscription",
            ProcessorCall::DeleteCustomer { .. } => "delete_customer",
        }
    }
}

#[derive(Debug, Clone)]
struct StoredCustomer {
    deleted: bool,
}

#[derive(Debug, Clone)]
struct StoredSubscription {
    customer_id: String,
    status: String,
    invoice_id: String,
}

#[derive(Debug, Clone)]
struct StoredInvoice {
    status: String,
    payment_intent_id: Option<String>,
}

#[derive(Debug, Clone)]
struct StoredPaymentIntent {
    status: String,
    bank: Option<String>,
    instructions_url: Option<String>,
}

/// Responses replayed for a repeated idempotency key.
#[derive(Debug, Clone)]
enum CachedResponse {
    Customer(CustomerId),
    Subscription(CreatedSubscription),
    Invoice(FinalizedInvoice),
    Attached,
    Confirmed(ConfirmedPaymentIntent),
}

#[derive(Default)]
struct ProcessorState {
    calls: Vec<ProcessorCall>,
    customers: HashMap<String, StoredCustomer>,
    subscriptions: HashMap<String, StoredSubscription>,
    invoices: HashMap<String, StoredInvoice>,
    payment_intents: HashMap<String, StoredPaymentIntent>,
    responses: HashMap<String, CachedResponse>,
    failure: Option<(WorkflowStep, FailureKind)>,
    next_id: u64,
}

impl ProcessorState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}_test{:06}", prefix, self.next_id)
    }

    /// Injected failures are checked before the replay cache and are never cached, so a
    /// retry after `clear_failure` proceeds normally.
    fn check_failure(&self, step: WorkflowStep) -> AppResult<()> {
        match self.failure {
            Some((failing, kind)) if failing == step => Err(kind.to_error(step)),
            _ => Ok(()),
        }
    }
}

/// Payment processor backed by in-memory maps.
///
/// Mutating calls honour idempotency keys the way Stripe does: a repeated key returns the
/// first successful response without creating anything new.
pub struct InMemoryPaymentProcessor {
    state: Mutex<ProcessorState>,
    with_instructions: bool,
}

impl InMemoryPaymentProcessor {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProcessorState::default()),
            with_instructions: true,
        }
    }

    pub fn failing_at(self, step: WorkflowStep, kind: FailureKind) -> Self {
        self.state.lock().unwrap().failure = Some((step, kind));
        self
    }

    /// Confirmed payment intents carry no hosted instructions URL.
    pub fn without_instructions(mut self) -> Self {
        self.with_instructions = false;
        self
    }

    pub fn clear_failure(&self) {
        self.state.lock().unwrap().failure = None;
    }

    pub fn calls(&self) -> Vec<ProcessorCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn steps(&self) -> Vec<&'static str> {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .map(ProcessorCall::step_name)
            .collect()
    }

    /// Customers that have not been deleted.
    pub fn customer_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .customers
            .values()
            .filter(|c| !c.deleted)
            .count()
    }

    pub fn subscription_count(&self) -> usize {
        self.state.lock().unwrap().subscriptions.len()
    }

    pub fn active_subscription_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.status != "canceled")
            .count()
    }
}

impl Default for InMemoryPaymentProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentProcessor for InMemoryPaymentProcessor {
    async fn create_customer(
        &self,
        customer: &NewCustomer,
        idempotency_key: &str,
    ) -> AppResult<CustomerId> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProcessorCall::CreateCustomer {
            name: customer.name.clone(),
            email: customer.email.clone(),
            idempotency_key: idempotency_key.to_string(),
        });
        state.check_failure(WorkflowStep::CreateCustomer)?;

        if let Some(CachedResponse::Customer(id)) = state.responses.get(idempotency_key) {
            return Ok(id.clone());
        }

        let id = state.next_id("cus");
        state
            .customers
            .insert(id.clone(), StoredCustomer { deleted: false });

        let id = CustomerId::new(id);
        state.responses.insert(
            idempotency_key.to_string(),
            CachedResponse::Customer(id.clone()),
        );
        Ok(id)
    }

    async fn create_subscription(
        &self,
        subscription: &NewSubscription,
        idempotency_key: &str,
    ) -> AppResult<CreatedSubscription> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProcessorCall::CreateSubscription {
            customer_id: subscription.customer_id.to_string(),
            price_id: subscription.price_id.clone(),
            days_until_due: subscription.days_until_due,
            idempotency_key: idempotency_key.to_string(),
        });
        state.check_failure(WorkflowStep::CreateSubscription)?;

        if let Some(CachedResponse::Subscription(created)) = state.responses.get(idempotency_key)
        {
            return Ok(created.clone());
        }

        match state.customers.get(subscription.customer_id.as_str()) {
            Some(c) if !c.deleted => {}
            _ => {
                return Err(AppError::ProcessorRejected {
                    code: Some("resource_missing".into()),
                    message: format!("No such customer: '{}'", subscription.customer_id),
                });
            }
        }

        let sub_id = state.next_id("sub");
        let invoice_id = state.next_id("in");
        state.invoices.insert(
            invoice_id.clone(),
            StoredInvoice {
                status: "draft".into(),
                payment_intent_id: None,
            },
        );
        state.subscriptions.insert(
            sub_id.clone(),
            StoredSubscription {
                customer_id: subscription.customer_id.to_string(),
                status: "active".into(),
                invoice_id: invoice_id.clone(),
            },
        );

        let created = CreatedSubscription {
            id: SubscriptionId::new(sub_id),
            status: "active".into(),
            latest_invoice: Some(InvoiceId::new(invoice_id)),
        };
        state.responses.insert(
            idempotency_key.to_string(),
            CachedResponse::Subscription(created.clone()),
        );
        Ok(created)
    }

    async fn finalize_invoice(
        &self,
        invoice_id: &InvoiceId,
        idempotency_key: &str,
    ) -> AppResult<FinalizedInvoice> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProcessorCall::FinalizeInvoice {
            invoice_id: invoice_id.to_string(),
            idempotency_key: idempotency_key.to_string(),
        });
        state.check_failure(WorkflowStep::FinalizeInvoice)?;

        if let Some(CachedResponse::Invoice(invoice)) = state.responses.get(idempotency_key) {
            return Ok(invoice.clone());
        }

        if !state.invoices.contains_key(invoice_id.as_str()) {
            return Err(AppError::NotFound);
        }

        let pi_id = state.next_id("pi");
        state.payment_intents.insert(
            pi_id.clone(),
            StoredPaymentIntent {
                status: "requires_payment_method".into(),
                bank: None,
                instructions_url: None,
            },
        );
        if let Some(invoice) = state.invoices.get_mut(invoice_id.as_str()) {
            invoice.status = "open".into();
            invoice.payment_intent_id = Some(pi_id.clone());
        }

        let finalized = FinalizedInvoice {
            id: invoice_id.clone(),
            payment_intent: Some(PaymentIntentId::new(pi_id)),
        };
        state.responses.insert(
            idempotency_key.to_string(),
            CachedResponse::Invoice(finalized.clone()),
        );
        Ok(finalized)
    }

    async fn attach_bank_transfer(
        &self,
        payment_intent_id: &PaymentIntentId,
        details: &BankTransferDetails,
        idempotency_key: &str,
    ) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProcessorCall::AttachBankTransfer {
            payment_intent_id: payment_intent_id.to_string(),
            name: details.name.clone(),
            email: details.email.clone(),
            bank: details.bank.clone(),
            idempotency_key: idempotency_key.to_string(),
        });
        state.check_failure(WorkflowStep::AttachBankTransfer)?;

        if let Some(CachedResponse::Attached) = state.responses.get(idempotency_key) {
            return Ok(());
        }

        let intent = state
            .payment_intents
            .get_mut(payment_intent_id.as_str())
            .ok_or(AppError::NotFound)?;
        intent.bank = Some(details.bank.clone());
        intent.status = "requires_confirmation".into();

        state
            .responses
            .insert(idempotency_key.to_string(), CachedResponse::Attached);
        Ok(())
    }

    async fn confirm_payment_intent(
        &self,
        payment_intent_id: &PaymentIntentId,
        idempotency_key: &str,
    ) -> AppResult<ConfirmedPaymentIntent> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProcessorCall::ConfirmPaymentIntent {
            payment_intent_id: payment_intent_id.to_string(),
            idempotency_key: idempotency_key.to_string(),
        });
        state.check_failure(WorkflowStep::ConfirmPaymentIntent)?;

        if let Some(CachedResponse::Confirmed(confirmed)) = state.responses.get(idempotency_key) {
            return Ok(confirmed.clone());
        }

        let with_instructions = self.with_instructions;
        let intent = state
            .payment_intents
            .get_mut(payment_intent_id.as_str())
            .ok_or(AppError::NotFound)?;
        if intent.bank.is_none() {
            return Err(AppError::ProcessorRejected {
                code: Some("payment_intent_unexpected_state".into()),
                message: "PaymentIntent has no payment method".into(),
            });
        }
        intent.status = "requires_action".into();
        intent.instructions_url = with_instructions.then(|| {
            format!(
                "https://payments.stripe.com/bank_transfers/instructions/{}",
                payment_intent_id
            )
        });

        let confirmed = ConfirmedPaymentIntent {
            id: payment_intent_id.clone(),
            status: intent.status.clone(),
            bank_instructions_url: intent.instructions_url.clone(),
        };
        state.responses.insert(
            idempotency_key.to_string(),
            CachedResponse::Confirmed(confirmed.clone()),
        );
        Ok(confirmed)
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<serde_json::Value> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProcessorCall::RetrieveSubscription {
            subscription_id: subscription_id.to_string(),
        });

        let subscription = state
            .subscriptions
            .get(subscription_id.as_str())
            .ok_or(AppError::NotFound)?;
        let invoice = state.invoices.get(&subscription.invoice_id);

        let payment_intent = invoice
            .and_then(|i| i.payment_intent_id.as_ref())
            .and_then(|pi_id| {
                state.payment_intents.get(pi_id).map(|pi| {
                    json!({
                        "id": pi_id,
                        "object": "payment_intent",
                        "status": pi.status,
                        "payment_method_types": ["id_bank_transfer"],
                        "next_action": pi.instructions_url.as_ref().map(|url| json!({
                            "type": "display_bank_transfer_instructions",
                            "display_bank_transfer_instructions": {
                                "hosted_instructions_url": url,
                                "financial_addresses": [{
                                    "type": "id_bban",
                                    "id_bban": {
                                        "bank": pi.bank,
                                        "hosted_instructions_url": url
                                    }
                                }]
                            }
                        }))
                    })
                })
            });

        Ok(json!({
            "id": subscription_id.as_str(),
            "object": "subscription",
            "customer": subscription.customer_id,
            "status": subscription.status,
            "collection_method": "send_invoice",
            "latest_invoice": invoice.map(|i| json!({
                "id": subscription.invoice_id,
                "object": "invoice",
                "status": i.status,
                "payment_intent": payment_intent
            }))
        }))
    }

    async fn cancel_subscription(&self, subscription_id: &SubscriptionId) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProcessorCall::CancelSubscription {
            subscription_id: subscription_id.to_string(),
        });

        let subscription = state
            .subscriptions
            .get_mut(subscription_id.as_str())
            .ok_or(AppError::NotFound)?;
        subscription.status = "canceled".into();
        Ok(())
    }

    async fn delete_customer(&self, customer_id: &CustomerId) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(ProcessorCall::DeleteCustomer {
            customer_id: customer_id.to_string(),
        });

        let customer = state
            .customers
            .get_mut(customer_id.as_str())
            .ok_or(AppError::NotFound)?;
        customer.deleted = true;
        Ok(())
    }
}
