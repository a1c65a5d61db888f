pub mod payment_mode;
pub mod webhook_event;
