//! Default functions for serde defaults in CRD specs.

pub fn provider_config_name() -> String {
    crate::constants::defaults::PROVIDER_CONFIG_NAME.to_string()
}

pub fn provider_config_ref() -> super::common::ProviderConfigReference {
    super::common::ProviderConfigReference::default()
}
