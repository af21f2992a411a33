pub mod common;
pub mod defaults;
pub mod message;
pub mod provider_config;

pub use message::{Message, MessageObservation, MessageParameters, MessageSpec, MessageStatus};
pub use provider_config::{
    CredentialsSource, ProviderConfig, ProviderConfigSpec, ProviderConfigStatus,
    ProviderConfigUsage, ProviderConfigUsageSpec, ProviderCredentials,
};
