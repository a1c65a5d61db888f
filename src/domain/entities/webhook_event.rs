use serde::{Deserialize, Deserializer};
use strum::{AsRefStr, Display, EnumString};

/// Webhook event types the service reacts to. Anything else parses as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, AsRefStr, Display, EnumString)]
pub enum WebhookEventKind {
    #[strum(serialize = "checkout.session.completed")]
    CheckoutSessionCompleted,
    #[strum(serialize = "payment_intent.succeeded")]
    PaymentIntentSucceeded,
    #[strum(serialize = "payment_intent.processing")]
    PaymentIntentProcessing,
    #[strum(serialize = "payment_intent.payment_failed")]
    PaymentIntentPaymentFailed,
    #[strum(serialize = "invoice.paid")]
    InvoicePaid,
    #[strum(serialize = "other")]
    Other,
}

impl WebhookEventKind {
    pub fn from_type(event_type: &str) -> Self {
        event_type.parse().unwrap_or(WebhookEventKind::Other)
    }
}

/// Envelope of a processor event notification.
///
/// Every field is optional and tolerates the wrong JSON type, so any JSON object parses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookEvent {
    #[serde(default, deserialize_with = "string_or_none")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "string_or_none")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
}

fn string_or_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_str().map(str::to_string))
}

impl WebhookEvent {
    /// Reads an envelope from any JSON value; non-objects yield an empty envelope.
    pub fn from_json(value: serde_json::Value) -> Self {
        serde_json::from_value(value).unwrap_or_default()
    }

    /// Events without a type classify as `Other`.
    pub fn kind(&self) -> WebhookEventKind {
        self.event_type
            .as_deref()
            .map(WebhookEventKind::from_type)
            .unwrap_or(WebhookEventKind::Other)
    }

    /// Id of the object the event is about, when present.
    pub fn object_id(&self) -> Option<&str> {
        self.data
            .get("object")
            .and_then(|object| object.get("id"))
            .and_then(|v| v.as_str())
    }
}
