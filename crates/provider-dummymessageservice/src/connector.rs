//! Builds an [`ExternalClient`] for a managed resource.
//!
//! Connecting a [`Message`] means:
//! 1. recording that it uses a ProviderConfig,
//! 2. fetching that ProviderConfig,
//! 3. extracting the credentials it names,
//! 4. building a message service client from them.

use std::collections::BTreeMap;

use kube::api::{Api, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use tracing::debug;

use crate::constants::{self, FIELD_MANAGER};
use crate::credentials;
use crate::crds::common::ResourceReference;
use crate::crds::message::Message;
use crate::crds::provider_config::{ProviderConfig, ProviderConfigUsage, ProviderConfigUsageSpec};
use crate::error::OperatorError;
use crate::external::{ExternalClient, MessageExternal};
use crate::message_client::MessageClient;

pub const ERR_TRACK_PC_USAGE: &str = "cannot track ProviderConfig usage";
pub const ERR_GET_PC: &str = "cannot get ProviderConfig";
pub const ERR_GET_CREDS: &str = "cannot get credentials";
pub const ERR_NEW_CLIENT: &str = "cannot create new Service";

/// Builds a message service client from extracted credentials.
pub type NewServiceFn =
    fn(http: reqwest::Client, base_url: &str, credentials: &[u8]) -> Result<MessageClient, OperatorError>;

/// The dummy message service needs no credentials; they are accepted and ignored.
pub fn new_dummy_message_service(
    http: reqwest::Client,
    base_url: &str,
    _credentials: &[u8],
) -> Result<MessageClient, OperatorError> {
    Ok(MessageClient::with_http(http, base_url))
}

/// Produces external clients for Message resources.
#[derive(Clone)]
pub struct Connector {
    kube: Client,
    http: reqwest::Client,
    base_url: String,
    new_service: NewServiceFn,
}

impl Connector {
    pub fn new(kube: Client, http: reqwest::Client, base_url: String) -> Self {
        Self {
            kube,
            http,
            base_url,
            new_service: new_dummy_message_service,
        }
    }

    /// Swap the function used to build the service client.
    pub fn with_new_service(mut self, new_service: NewServiceFn) -> Self {
        self.new_service = new_service;
        self
    }

    pub async fn connect(&self, mg: &Message) -> Result<Box<dyn ExternalClient>, OperatorError> {
        self.track_usage(mg)
            .await
            .map_err(|e| OperatorError::connect(ERR_TRACK_PC_USAGE, e))?;

        let pc_name = &mg.spec.provider_config_ref.name;
        let pcs: Api<ProviderConfig> = Api::all(self.kube.clone());
        let pc = pcs
            .get_opt(pc_name)
            .await
            .map_err(|e| OperatorError::connect(ERR_GET_PC, e.into()))?
            .ok_or_else(|| {
                OperatorError::connect(
                    ERR_GET_PC,
                    OperatorError::NotFound(format!("ProviderConfig '{pc_name}'")),
                )
            })?;

        let data = credentials::extract(&self.kube, &pc.spec.credentials)
            .await
            .map_err(|e| OperatorError::connect(ERR_GET_CREDS, e))?;

        let service = (self.new_service)(self.http.clone(), &self.base_url, &data)
            .map_err(|e| OperatorError::connect(ERR_NEW_CLIENT, e))?;

        debug!(message = %mg.name_any(), provider_config = %pc_name, "Connected to message service");
        Ok(Box::new(MessageExternal::new(service)))
    }

    async fn track_usage(&self, mg: &Message) -> Result<(), OperatorError> {
        let usage = usage_for(mg)?;
        let name = usage.name_any();
        let api: Api<ProviderConfigUsage> = Api::all(self.kube.clone());
        api.patch(
            &name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &Patch::Apply(&usage),
        )
        .await?;
        Ok(())
    }
}

/// Build the ProviderConfigUsage recording that `mg` uses its ProviderConfig.
///
/// Named after the resource UID and owned by the resource, so it goes away with it.
pub fn usage_for(mg: &Message) -> Result<ProviderConfigUsage, OperatorError> {
    let uid = mg
        .uid()
        .ok_or_else(|| OperatorError::Config(format!("Message '{}' has no uid", mg.name_any())))?;
    let owner = mg.controller_owner_ref(&()).ok_or_else(|| {
        OperatorError::Config(format!("cannot build owner reference for '{}'", mg.name_any()))
    })?;

    let mut usage = ProviderConfigUsage::new(
        &uid,
        ProviderConfigUsageSpec {
            provider_config_ref: mg.spec.provider_config_ref.clone(),
            resource_ref: ResourceReference {
                api_version: Message::api_version(&()).to_string(),
                kind: Message::kind(&()).to_string(),
                name: mg.name_any(),
                uid: Some(uid.clone()),
            },
        },
    );
    usage.metadata.owner_references = Some(vec![owner]);
    usage.metadata.labels = Some(BTreeMap::from([
        (
            constants::labels::PROVIDER_CONFIG.to_string(),
            mg.spec.provider_config_ref.name.clone(),
        ),
        (
            constants::labels::MANAGED_BY.to_string(),
            constants::values::MANAGED_BY.to_string(),
        ),
    ]));
    Ok(usage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crds::common::{DeletionPolicy, ProviderConfigReference};
    use crate::crds::message::{MessageParameters, MessageSpec};

    fn message(uid: Option<&str>) -> Message {
        let mut mg = Message::new(
            "hello",
            MessageSpec {
                for_provider: MessageParameters {
                    content: "hello world".into(),
                },
                provider_config_ref: ProviderConfigReference {
                    name: "example".into(),
                },
                deletion_policy: DeletionPolicy::Delete,
            },
        );
        mg.metadata.uid = uid.map(String::from);
        mg
    }

    #[test]
    fn test_usage_for_message() {
        let usage = usage_for(&message(Some("1234-abcd"))).unwrap();
        assert_eq!(usage.name_any(), "1234-abcd");
        assert_eq!(usage.spec.provider_config_ref.name, "example");
        assert_eq!(usage.spec.resource_ref.kind, "Message");
        assert_eq!(usage.spec.resource_ref.name, "hello");
        assert_eq!(
            usage.spec.resource_ref.api_version,
            "core.dummymessageservice.crossplane.io/v1alpha1"
        );

        let owners = usage.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, "1234-abcd");
        assert_eq!(
            usage.metadata.labels.unwrap()[constants::labels::PROVIDER_CONFIG],
            "example"
        );
    }

    #[test]
    fn test_usage_requires_uid() {
        let err = usage_for(&message(None)).unwrap_err();
        assert!(matches!(err, OperatorError::Config(_)));
    }

    #[test]
    fn test_new_dummy_message_service_ignores_credentials() {
        let client =
            new_dummy_message_service(reqwest::Client::new(), "http://svc:8000/", b"anything")
                .unwrap();
        assert_eq!(client.base_url(), "http://svc:8000");
    }
}
