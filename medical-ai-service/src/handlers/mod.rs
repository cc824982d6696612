//! HTTP handlers for the medical AI service.

pub mod generate;
pub mod health;
pub mod home;
pub mod metrics;
