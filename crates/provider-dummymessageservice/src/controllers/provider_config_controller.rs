use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::runtime::controller::{Action, Controller};
use kube::runtime::finalizer::{finalizer, Error as FinalizerError, Event as Finalizer};
use kube::runtime::reflector::ObjectRef;
use kube::runtime::watcher;
use kube::{Client, ResourceExt};
use tracing::{error, info, warn};

use crate::constants::{self, conditions, defaults, FIELD_MANAGER};
use crate::crds::common::{merge_conditions, Condition};
use crate::crds::provider_config::{ProviderConfig, ProviderConfigUsage};
use crate::error::OperatorError;
use crate::metrics;

/// Finalizer keeping a ProviderConfig alive while managed resources use it.
pub const IN_USE_FINALIZER: &str = "in-use.crossplane.io";

const CONTROLLER: &str = "providerconfig";

/// Shared context for the ProviderConfig reconciler.
pub struct Context {
    pub client: Client,
}

/// Start the ProviderConfig controller.
pub async fn run(client: Client) {
    let api: Api<ProviderConfig> = Api::all(client.clone());
    let usages: Api<ProviderConfigUsage> = Api::all(client.clone());

    let ctx = Arc::new(Context { client });

    Controller::new(api, watcher::Config::default())
        .watches(usages, watcher::Config::default(), |usage| {
            Some(ObjectRef::new(&usage.spec.provider_config_ref.name))
        })
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            if let Err(e) = res {
                error!("ProviderConfig reconciliation error: {:?}", e);
            }
        })
        .await;
}

async fn reconcile(pc: Arc<ProviderConfig>, ctx: Arc<Context>) -> Result<Action, OperatorError> {
    let api: Api<ProviderConfig> = Api::all(ctx.client.clone());

    let result = finalizer(&api, IN_USE_FINALIZER, pc, |event| async {
        match event {
            Finalizer::Apply(pc) => apply(&ctx.client, &pc).await,
            Finalizer::Cleanup(pc) => cleanup(&ctx.client, &pc).await,
        }
    })
    .await
    .map_err(|e| match e {
        FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => e,
        other => OperatorError::Finalizer(other.to_string()),
    });

    metrics::record_reconciliation(CONTROLLER, if result.is_ok() { "success" } else { "error" });
    result
}

/// Record how many managed resources use this ProviderConfig.
async fn apply(client: &Client, pc: &ProviderConfig) -> Result<Action, OperatorError> {
    let name = pc.name_any();
    let users = count_users(client, &name).await?;
    info!(provider_config = %name, users, "Reconciling ProviderConfig");

    let existing = pc
        .status
        .as_ref()
        .map(|s| s.conditions.as_slice())
        .unwrap_or(&[]);
    let now = k8s_openapi::chrono::Utc::now().to_rfc3339();
    let conditions = merge_conditions(existing, vec![usage_condition(users)], &now);

    let patch = serde_json::json!({
        "status": { "users": users, "conditions": conditions }
    });
    let api: Api<ProviderConfig> = Api::all(client.clone());
    api.patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
        .await?;

    Ok(Action::requeue(Duration::from_secs(
        defaults::REQUEUE_PROVIDER_CONFIG_SECS,
    )))
}

/// Block deletion while any usage remains.
async fn cleanup(client: &Client, pc: &ProviderConfig) -> Result<Action, OperatorError> {
    let name = pc.name_any();
    let users = count_users(client, &name).await?;
    check_deletable(&name, users)?;
    info!(provider_config = %name, "ProviderConfig no longer in use, releasing");
    Ok(Action::await_change())
}

fn check_deletable(name: &str, users: i64) -> Result<(), OperatorError> {
    if users > 0 {
        return Err(OperatorError::Config(format!(
            "ProviderConfig '{name}' is still used by {users} resource(s)"
        )));
    }
    Ok(())
}

async fn count_users(client: &Client, name: &str) -> Result<i64, OperatorError> {
    let usages: Api<ProviderConfigUsage> = Api::all(client.clone());
    let selector = format!("{}={name}", constants::labels::PROVIDER_CONFIG);
    let list = usages.list(&ListParams::default().labels(&selector)).await?;
    Ok(list.items.len() as i64)
}

fn usage_condition(users: i64) -> Condition {
    if users > 0 {
        Condition::new(
            conditions::READY,
            true,
            conditions::REASON_IN_USE,
            Some(format!("Used by {users} resource(s)")),
        )
    } else {
        Condition::new(conditions::READY, true, conditions::REASON_UNUSED, None)
    }
}

/// Error policy.
fn error_policy(_pc: Arc<ProviderConfig>, error: &OperatorError, _ctx: Arc<Context>) -> Action {
    warn!("ProviderConfig reconciliation error: {error}");
    if error.is_transient() {
        Action::requeue(Duration::from_secs(defaults::REQUEUE_TRANSIENT_ERROR_SECS))
    } else {
        // In-use deletions land here; re-check on the regular cadence.
        Action::requeue(Duration::from_secs(defaults::REQUEUE_PROVIDER_CONFIG_SECS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_condition() {
        let c = usage_condition(2);
        assert_eq!(c.reason.as_deref(), Some("InUse"));
        assert_eq!(c.message.as_deref(), Some("Used by 2 resource(s)"));

        let c = usage_condition(0);
        assert_eq!(c.reason.as_deref(), Some("Unused"));
        assert!(c.message.is_none());
    }

    #[test]
    fn test_check_deletable() {
        assert!(check_deletable("default", 0).is_ok());
        let err = check_deletable("default", 3).unwrap_err();
        assert!(err.to_string().contains("still used by 3"));
        assert!(!err.is_transient());
    }
}
