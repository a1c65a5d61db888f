pub mod subscription;
pub mod webhook;
