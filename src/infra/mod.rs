pub mod app;
pub mod config;
pub mod error;
pub mod http_client;
pub mod retry;
pub mod setup;
pub mod stripe_client;
pub mod stripe_payment_adapter;
pub mod webhook_signature;
