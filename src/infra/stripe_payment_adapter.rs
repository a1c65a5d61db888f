//! Stripe implementation of the [`PaymentProcessor`] port.

use async_trait::async_trait;
use tracing::debug;

use crate::{
    app_error::AppResult,
    application::ports::payment_processor::{
        BankTransferDetails, ConfirmedPaymentIntent, CreatedSubscription, CustomerId,
        FinalizedInvoice, InvoiceId, NewCustomer, NewSubscription, PaymentIntentId,
        PaymentProcessor, SubscriptionId,
    },
    infra::stripe_client::StripeClient,
};

pub struct StripePaymentAdapter {
    client: StripeClient,
}

impl StripePaymentAdapter {
    pub fn new(client: StripeClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PaymentProcessor for StripePaymentAdapter {
    async fn create_customer(
        &self,
        customer: &NewCustomer,
        idempotency_key: &str,
    ) -> AppResult<CustomerId> {
        let created = self
            .client
            .create_customer(&customer.name, &customer.email, idempotency_key)
            .await?;
        Ok(CustomerId::new(created.id))
    }

    async fn create_subscription(
        &self,
        subscription: &NewSubscription,
        idempotency_key: &str,
    ) -> AppResult<CreatedSubscription> {
        let created = self
            .client
            .create_subscription(
                subscription.customer_id.as_str(),
                &subscription.price_id,
                subscription.days_until_due,
                idempotency_key,
            )
            .await?;

        Ok(CreatedSubscription {
            latest_invoice: created
                .latest_invoice
                .as_ref()
                .map(|invoice| InvoiceId::new(invoice.id())),
            id: SubscriptionId::new(created.id),
            status: created.status,
        })
    }

    async fn finalize_invoice(
        &self,
        invoice_id: &InvoiceId,
        idempotency_key: &str,
    ) -> AppResult<FinalizedInvoice> {
        let invoice = self
            .client
            .finalize_invoice(invoice_id.as_str(), idempotency_key)
            .await?;

        Ok(FinalizedInvoice {
            payment_intent: invoice
                .payment_intent
                .as_ref()
                .map(|intent| PaymentIntentId::new(intent.id())),
            id: InvoiceId::new(invoice.id),
        })
    }

    async fn attach_bank_transfer(
        &self,
        payment_intent_id: &PaymentIntentId,
        details: &BankTransferDetails,
        idempotency_key: &str,
    ) -> AppResult<()> {
        self.client
            .attach_bank_transfer(
                payment_intent_id.as_str(),
                &details.name,
                &details.email,
                &details.bank,
                idempotency_key,
            )
            .await?;
        Ok(())
    }

    async fn confirm_payment_intent(
        &self,
        payment_intent_id: &PaymentIntentId,
        idempotency_key: &str,
    ) -> AppResult<ConfirmedPaymentIntent> {
        let intent = self
            .client
            .confirm_payment_intent(payment_intent_id.as_str(), idempotency_key)
            .await?;

        Ok(ConfirmedPaymentIntent {
            bank_instructions_url: intent.bank_instructions_url().map(str::to_string),
            id: PaymentIntentId::new(intent.id),
            status: intent.status,
        })
    }

    async fn retrieve_subscription(
        &self,
        subscription_id: &SubscriptionId,
    ) -> AppResult<serde_json::Value> {
        self.client
            .get_subscription_expanded(subscription_id.as_str())
            .await
    }

    async fn cancel_subscription(&self, subscription_id: &SubscriptionId) -> AppResult<()> {
        let canceled = self
            .client
            .cancel_subscription(subscription_id.as_str())
            .await?;
        debug!(subscription_id = %canceled.id, status = %canceled.status, "Stripe subscription canceled");
        Ok(())
    }

    async fn delete_customer(&self, customer_id: &CustomerId) -> AppResult<()> {
        let deleted = self.client.delete_customer(customer_id.as_str()).await?;
        debug!(customer_id = %deleted.id, "Stripe customer deleted");
        Ok(())
    }
}
