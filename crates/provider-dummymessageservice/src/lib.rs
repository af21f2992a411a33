//! Kubernetes provider for the dummy message service.
//!
//! Reconciles cluster-scoped `Message` resources against a toy HTTP message
//! store: a message is created with `POST /message`, observed by scanning
//! `GET /messages` for matching content and removed with `DELETE /message`.

pub mod config;
pub mod connector;
pub mod constants;
pub mod controllers;
pub mod crds;
pub mod credentials;
pub mod error;
pub mod external;
pub mod leader_election;
pub mod message_client;
pub mod metrics;
pub mod telemetry;

pub use crds::{Message, ProviderConfig, ProviderConfigUsage};
pub use error::{OperatorError, Result};

use kube::CustomResourceExt;

/// All CRDs served by the provider, rendered as a multi-document YAML stream.
pub fn crds_yaml() -> std::result::Result<String, serde_yaml::Error> {
    let docs = [
        serde_yaml::to_string(&Message::crd())?,
        serde_yaml::to_string(&ProviderConfig::crd())?,
        serde_yaml::to_string(&ProviderConfigUsage::crd())?,
    ];
    Ok(docs
        .iter()
        .map(|d| format!("---\n{d}"))
        .collect::<Vec<_>>()
        .join(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crds_yaml_has_three_documents() {
        let yaml = crds_yaml().unwrap();
        assert_eq!(yaml.matches("---\n").count(), 3);
        assert!(yaml.contains("messages.core.dummymessageservice.crossplane.io"));
        assert!(yaml.contains("providerconfigs.dummymessageservice.crossplane.io"));
        assert!(yaml.contains("providerconfigusages.dummymessageservice.crossplane.io"));
    }
}
