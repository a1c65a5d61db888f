use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::{
    app_error::{AppError, AppResult},
    domain::entities::webhook_event::{WebhookEvent, WebhookEventKind},
    infra::webhook_signature::verify_webhook_signature,
};

/// What the service did with an accepted event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookAction {
    /// A checkout session completed; payment is recorded as received.
    PaymentReceived,
    /// Payment progress on an intent or invoice was logged.
    PaymentUpdateLogged,
    /// The event type is not one the service reacts to.
    Ignored,
}

#[derive(Debug, Clone)]
pub struct WebhookOutcome {
    /// `None` when the payload carried no string `type`.
    pub event_type: Option<String>,
    /// Whether the payload signature was checked against the configured secret.
    pub verified: bool,
    pub action: WebhookAction,
}

pub struct WebhookUseCases {
    signing_secret: Option<SecretString>,
    tolerance_secs: i64,
}

impl WebhookUseCases {
    pub fn new(signing_secret: Option<SecretString>, tolerance_secs: i64) -> Self {
        Self {
            signing_secret,
            tolerance_secs,
        }
    }

    pub fn verifies_signatures(&self) -> bool {
        self.signing_secret.is_some()
    }

    /// Authenticate (when a secret is configured) and dispatch a raw event payload.
    ///
    /// The signature covers the exact bytes received, so `payload` must be the unparsed body.
    pub fn handle_event(
        &self,
        payload: &[u8],
        signature_header: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        let verified = match &self.signing_secret {
            Some(secret) => {
                let signature = signature_header.ok_or_else(|| {
                    warn!("Webhook signature verification failed: missing header");
                    AppError::InvalidSignature("Missing stripe-signature header".into())
                })?;
                verify_webhook_signature(
                    payload,
                    signature,
                    secret.expose_secret(),
                    self.tolerance_secs,
                )
                .inspect_err(|e| warn!(error = %e, "Webhook signature verification failed"))?;
                true
            }
            None => false,
        };

        let value: serde_json::Value = serde_json::from_slice(payload)
            .map_err(|e| AppError::InvalidInput(format!("Invalid webhook payload: {}", e)))?;
        let event = WebhookEvent::from_json(value);

        info!(
            event_type = event.event_type.as_deref().unwrap_or("unknown"),
            event_id = event.id.as_deref().unwrap_or("unknown"),
            verified,
            "Webhook received"
        );

        let action = dispatch(&event);

        Ok(WebhookOutcome {
            event_type: event.event_type,
            verified,
            action,
        })
    }
}

fn dispatch(event: &WebhookEvent) -> WebhookAction {
    let object_id = event.object_id().unwrap_or("unknown");

    match event.kind() {
        WebhookEventKind::CheckoutSessionCompleted => {
            info!(session_id = object_id, "Payment received!");
            WebhookAction::PaymentReceived
        }
        kind @ (WebhookEventKind::PaymentIntentSucceeded
        | WebhookEventKind::PaymentIntentProcessing
        | WebhookEventKind::PaymentIntentPaymentFailed
        | WebhookEventKind::InvoicePaid) => {
            info!(event_kind = %kind, object_id, "Payment update");
            WebhookAction::PaymentUpdateLogged
        }
        WebhookEventKind::Other => {
            debug!(
                event_type = event.event_type.as_deref().unwrap_or("unknown"),
                "Unhandled webhook event type"
            );
            WebhookAction::Ignored
        }
    }
}
