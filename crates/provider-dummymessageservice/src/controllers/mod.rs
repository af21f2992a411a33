//! Reconcilers for the provider's custom resources.
//!
//! - [`message_controller`]: converges `Message` resources on the message service
//! - [`provider_config_controller`]: tracks `ProviderConfig` usage

pub mod message_controller;
pub mod provider_config_controller;
