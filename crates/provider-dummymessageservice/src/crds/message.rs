use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{Condition, DeletionPolicy, ProviderConfigReference};

/// Desired state of a message stored in the dummy message service.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "core.dummymessageservice.crossplane.io",
    version = "v1alpha1",
    kind = "Message",
    status = "MessageStatus",
    category = "crossplane",
    category = "managed",
    category = "dummymessageservice",
    printcolumn = r#"{"name":"READY","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"SYNCED","type":"string","jsonPath":".status.conditions[?(@.type=='Synced')].status"}"#,
    printcolumn = r#"{"name":"CONTENT","type":"string","jsonPath":".spec.forProvider.content"}"#,
    printcolumn = r#"{"name":"ID","type":"integer","jsonPath":".status.atProvider.id"}"#,
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct MessageSpec {
    /// Configurable fields of the external message.
    pub for_provider: MessageParameters,

    /// ProviderConfig used to connect to the message service.
    #[serde(default = "super::defaults::provider_config_ref")]
    pub provider_config_ref: ProviderConfigReference,

    /// What happens to the external message when this resource is deleted.
    #[serde(default)]
    pub deletion_policy: DeletionPolicy,
}

/// Configurable fields of a Message.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MessageParameters {
    pub content: String,
}

/// Observable fields of a Message.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct MessageObservation {
    /// Id assigned by the message service.
    #[serde(default)]
    pub id: Option<i64>,

    /// Content as stored by the message service.
    #[serde(default)]
    pub content: Option<String>,
}

/// Observed state of a Message.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageStatus {
    #[serde(default)]
    pub at_provider: MessageObservation,

    /// Ready and Synced conditions.
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl Message {
    /// Content the external message should carry.
    pub fn desired_content(&self) -> &str {
        &self.spec.for_provider.content
    }

    /// Id recorded from a previous create or observe, if any.
    pub fn observed_id(&self) -> Option<i64> {
        self.status.as_ref().and_then(|s| s.at_provider.id)
    }

    /// Conditions currently recorded on the resource.
    pub fn conditions(&self) -> &[Condition] {
        self.status
            .as_ref()
            .map(|s| s.conditions.as_slice())
            .unwrap_or(&[])
    }
}
