//! Credential extraction for ProviderConfigs.
//!
//! Credentials come from one of four sources: nothing, a key in a Secret, an
//! environment variable of the provider process, or a file on its filesystem.

use k8s_openapi::api::core::v1::Secret;
use kube::api::Api;
use kube::Client;
use tracing::debug;

use crate::crds::common::{EnvSelector, FsSelector, SecretKeySelector};
use crate::crds::provider_config::{CredentialsSource, ProviderCredentials};
use crate::error::OperatorError;

/// Extract the credential bytes a ProviderConfig points at.
pub async fn extract(
    client: &Client,
    credentials: &ProviderCredentials,
) -> Result<Vec<u8>, OperatorError> {
    match credentials.source {
        CredentialsSource::None => Ok(Vec::new()),
        CredentialsSource::Secret => {
            let selector = credentials.secret_ref.as_ref().ok_or_else(|| {
                OperatorError::Config("credentials source Secret requires secretRef".into())
            })?;
            from_secret_ref(client, selector).await
        }
        CredentialsSource::Environment => {
            let selector = credentials.env.as_ref().ok_or_else(|| {
                OperatorError::Config("credentials source Environment requires env".into())
            })?;
            from_env(selector)
        }
        CredentialsSource::Filesystem => {
            let selector = credentials.fs.as_ref().ok_or_else(|| {
                OperatorError::Config("credentials source Filesystem requires fs".into())
            })?;
            from_fs(selector).await
        }
    }
}

async fn from_secret_ref(
    client: &Client,
    selector: &SecretKeySelector,
) -> Result<Vec<u8>, OperatorError> {
    debug!(secret = %selector.name, namespace = %selector.namespace, "Reading credentials Secret");
    let api: Api<Secret> = Api::namespaced(client.clone(), &selector.namespace);
    let secret = api.get_opt(&selector.name).await?.ok_or_else(|| {
        OperatorError::Credentials(format!(
            "Secret '{}/{}' not found",
            selector.namespace, selector.name
        ))
    })?;
    from_secret(&secret, selector)
}

/// Read `selector.key` from an already fetched Secret.
pub fn from_secret(secret: &Secret, selector: &SecretKeySelector) -> Result<Vec<u8>, OperatorError> {
    if let Some(bytes) = secret.data.as_ref().and_then(|d| d.get(&selector.key)) {
        return Ok(bytes.0.clone());
    }
    // stringData is write-only on a real API server but shows up on objects built locally.
    if let Some(s) = secret.string_data.as_ref().and_then(|d| d.get(&selector.key)) {
        return Ok(s.clone().into_bytes());
    }
    Err(OperatorError::Credentials(format!(
        "key '{}' not found in Secret '{}/{}'",
        selector.key, selector.namespace, selector.name
    )))
}

/// Read credentials from an environment variable.
pub fn from_env(selector: &EnvSelector) -> Result<Vec<u8>, OperatorError> {
    std::env::var(&selector.name)
        .map(String::into_bytes)
        .map_err(|e| {
            OperatorError::Credentials(format!(
                "cannot read environment variable '{}': {e}",
                selector.name
            ))
        })
}

/// Read credentials from a file.
pub async fn from_fs(selector: &FsSelector) -> Result<Vec<u8>, OperatorError> {
    tokio::fs::read(&selector.path).await.map_err(|e| {
        OperatorError::Credentials(format!("cannot read file '{}': {e}", selector.path))
    })
}
