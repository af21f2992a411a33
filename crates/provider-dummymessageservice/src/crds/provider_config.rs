use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::common::{
    Condition, EnvSelector, FsSelector, ProviderConfigReference, ResourceReference,
    SecretKeySelector,
};

/// Configures how the provider connects to the message service.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dummymessageservice.crossplane.io",
    version = "v1alpha1",
    kind = "ProviderConfig",
    status = "ProviderConfigStatus",
    category = "crossplane",
    category = "provider",
    category = "dummymessageservice",
    printcolumn = r#"{"name":"AGE","type":"date","jsonPath":".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name":"SECRET-NAME","type":"string","priority":1,"jsonPath":".spec.credentials.secretRef.name"}"#
)]
pub struct ProviderConfigSpec {
    /// Credentials used to connect to the message service.
    pub credentials: ProviderCredentials,
}

/// Where the provider reads credentials from.
#[derive(Clone, Debug, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCredentials {
    pub source: CredentialsSource,

    /// Secret key holding the credentials (source Secret).
    #[serde(default)]
    pub secret_ref: Option<SecretKeySelector>,

    /// Environment variable holding the credentials (source Environment).
    #[serde(default)]
    pub env: Option<EnvSelector>,

    /// File holding the credentials (source Filesystem).
    #[serde(default)]
    pub fs: Option<FsSelector>,
}

/// Credential source kinds.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum CredentialsSource {
    None,
    Secret,
    Environment,
    Filesystem,
}

/// Observed state of a ProviderConfig.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ProviderConfigStatus {
    /// Number of managed resources using this ProviderConfig.
    #[serde(default)]
    pub users: i64,

    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// Records that a managed resource uses a ProviderConfig.
#[derive(CustomResource, Clone, Debug, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "dummymessageservice.crossplane.io",
    version = "v1alpha1",
    kind = "ProviderConfigUsage",
    category = "crossplane",
    category = "provider",
    category = "dummymessageservice",
    printcolumn = r#"{"name":"CONFIG-NAME","type":"string","jsonPath":".spec.providerConfigRef.name"}"#,
    printcolumn = r#"{"name":"RESOURCE-KIND","type":"string","jsonPath":".spec.resourceRef.kind"}"#,
    printcolumn = r#"{"name":"RESOURCE-NAME","type":"string","jsonPath":".spec.resourceRef.name"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfigUsageSpec {
    pub provider_config_ref: ProviderConfigReference,
    pub resource_ref: ResourceReference,
}
