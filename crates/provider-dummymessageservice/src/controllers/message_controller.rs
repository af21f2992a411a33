use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use kube::api::{Api, Patch, PatchParams};
use kube::runtime::controller::{self, Action, Controller};
use kube::runtime::finalizer::{finalizer, Error as FinalizerError, Event as Finalizer};
use kube::runtime::watcher;
use kube::{Client, ResourceExt};
use tracing::{debug, error, info, warn};

use crate::connector::Connector;
use crate::constants::{conditions, defaults, FIELD_MANAGER, FINALIZER};
use crate::crds::common::{merge_conditions, Condition, DeletionPolicy};
use crate::crds::message::{Message, MessageObservation};
use crate::error::OperatorError;
use crate::external::ExternalClient;
use crate::metrics;

const CONTROLLER: &str = "message";

/// Shared context for the Message reconciler.
pub struct Context {
    pub client: Client,
    pub connector: Connector,
    pub poll_interval: Duration,
}

/// Start the Message controller.
pub async fn run(ctx: Arc<Context>, max_reconcile_rate: u16) {
    let api: Api<Message> = Api::all(ctx.client.clone());

    Controller::new(api, watcher::Config::default())
        .with_config(controller::Config::default().concurrency(max_reconcile_rate))
        .shutdown_on_signal()
        .run(reconcile, error_policy, ctx)
        .for_each(|res| async move {
            match res {
                Ok((obj, action)) => debug!(message = %obj.name, ?action, "Reconciled Message"),
                Err(e) => error!("Message reconciliation error: {:?}", e),
            }
        })
        .await;
}

/// Main reconciliation function.
async fn reconcile(mg: Arc<Message>, ctx: Arc<Context>) -> Result<Action, OperatorError> {
    let started = Instant::now();
    let api: Api<Message> = Api::all(ctx.client.clone());

    let result = finalizer(&api, FINALIZER, mg, |event| async {
        match event {
            Finalizer::Apply(mg) => apply(&ctx, &mg).await,
            Finalizer::Cleanup(mg) => cleanup(&ctx, &mg).await,
        }
    })
    .await
    .map_err(|e| match e {
        FinalizerError::ApplyFailed(e) | FinalizerError::CleanupFailed(e) => e,
        other => OperatorError::Finalizer(other.to_string()),
    });

    metrics::observe_reconcile_duration(CONTROLLER, started.elapsed().as_secs_f64());
    metrics::record_reconciliation(CONTROLLER, if result.is_ok() { "success" } else { "error" });
    result
}

/// What a sync pass did to the external message.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// The message was missing and has been created.
    Created(MessageObservation),
    /// The message exists and matches.
    Available(Option<MessageObservation>),
    /// The message existed but was out of date and has been updated.
    Updated(Option<MessageObservation>),
}

impl SyncOutcome {
    /// What to record in `status.atProvider`; `None` leaves it untouched.
    pub fn observation(&self) -> Option<&MessageObservation> {
        match self {
            SyncOutcome::Created(o) => Some(o),
            SyncOutcome::Available(o) | SyncOutcome::Updated(o) => o.as_ref(),
        }
    }

    /// Ready and Synced conditions for this outcome.
    pub fn conditions(&self) -> Vec<Condition> {
        let ready = match self {
            SyncOutcome::Created(_) => Condition::new(
                conditions::READY,
                false,
                conditions::REASON_CREATING,
                None,
            ),
            SyncOutcome::Available(_) | SyncOutcome::Updated(_) => Condition::new(
                conditions::READY,
                true,
                conditions::REASON_AVAILABLE,
                None,
            ),
        };
        vec![
            ready,
            Condition::new(
                conditions::SYNCED,
                true,
                conditions::REASON_RECONCILE_SUCCESS,
                None,
            ),
        ]
    }

    fn requeue_after(&self, poll_interval: Duration) -> Duration {
        match self {
            SyncOutcome::Created(_) => Duration::from_secs(defaults::REQUEUE_CREATING_SECS),
            SyncOutcome::Available(_) | SyncOutcome::Updated(_) => poll_interval,
        }
    }
}

/// Observe the external message, then create or update it as needed.
pub async fn sync_external(
    external: &dyn ExternalClient,
    mg: &Message,
) -> Result<SyncOutcome, OperatorError> {
    let observation = external.observe(mg).await;
    metrics::record_external_operation("observe", observation.is_ok());
    let observation = observation?;

    if !observation.resource_exists {
        let created = external.create(mg).await;
        metrics::record_external_operation("create", created.is_ok());
        return Ok(SyncOutcome::Created(created?.observed));
    }

    let observed = observation.observed;
    if observation.resource_up_to_date {
        return Ok(SyncOutcome::Available(observed));
    }

    let updated = external.update(mg).await;
    metrics::record_external_operation("update", updated.is_ok());
    updated?;
    Ok(SyncOutcome::Updated(observed))
}

/// Delete the external message unless the resource asks for it to be orphaned.
///
/// The message is observed first: one that no longer exists needs no delete,
/// and a fresh observation replaces whatever id the status last recorded.
/// Returns whether a delete was issued.
pub async fn delete_external(
    external: &dyn ExternalClient,
    mg: &Message,
) -> Result<bool, OperatorError> {
    if mg.spec.deletion_policy == DeletionPolicy::Orphan {
        return Ok(false);
    }

    let observation = external.observe(mg).await;
    metrics::record_external_operation("observe", observation.is_ok());
    let observation = observation?;
    if !observation.resource_exists {
        return Ok(false);
    }

    let target = match observation.observed {
        Some(observed) => with_observation(mg, observed),
        None => mg.clone(),
    };
    let deleted = external.delete(&target).await;
    metrics::record_external_operation("delete", deleted.is_ok());
    deleted?;
    Ok(true)
}

fn with_observation(mg: &Message, observed: MessageObservation) -> Message {
    let mut target = mg.clone();
    target.status.get_or_insert_with(Default::default).at_provider = observed;
    target
}

/// Converge the external message on the desired state.
async fn apply(ctx: &Context, mg: &Message) -> Result<Action, OperatorError> {
    let name = mg.name_any();
    info!(message = %name, content = %mg.desired_content(), "Reconciling Message");

    let outcome = match connect_and_sync(ctx, mg).await {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(message = %name, "Sync failed: {e}");
            let synced = Condition::new(
                conditions::SYNCED,
                false,
                conditions::REASON_RECONCILE_ERROR,
                Some(e.to_string()),
            );
            if let Err(patch_err) = update_status(&ctx.client, mg, None, vec![synced]).await {
                warn!(message = %name, "Cannot record sync failure: {patch_err}");
            }
            return Err(e);
        }
    };

    if let SyncOutcome::Created(ref o) = outcome {
        info!(message = %name, id = ?o.id, "Created external message");
    }

    update_status(
        &ctx.client,
        mg,
        outcome.observation().cloned(),
        outcome.conditions(),
    )
    .await?;

    Ok(Action::requeue(outcome.requeue_after(ctx.poll_interval)))
}

async fn connect_and_sync(ctx: &Context, mg: &Message) -> Result<SyncOutcome, OperatorError> {
    let external = ctx.connector.connect(mg).await?;
    sync_external(external.as_ref(), mg).await
}

/// Cleanup on resource deletion. Errors keep the finalizer in place.
async fn cleanup(ctx: &Context, mg: &Message) -> Result<Action, OperatorError> {
    let name = mg.name_any();

    if mg.spec.deletion_policy == DeletionPolicy::Orphan {
        info!(message = %name, "Orphaning external message (deletionPolicy=Orphan)");
        return Ok(Action::await_change());
    }

    info!(message = %name, id = ?mg.observed_id(), "Deleting external message");
    let ready = Condition::new(
        conditions::READY,
        false,
        conditions::REASON_DELETING,
        None,
    );
    if let Err(e) = update_status(&ctx.client, mg, None, vec![ready]).await {
        debug!(message = %name, "Cannot record deletion: {e}");
    }

    let external = ctx.connector.connect(mg).await?;
    if !delete_external(external.as_ref(), mg).await? {
        info!(message = %name, "External message already gone");
    }

    Ok(Action::await_change())
}

/// Patch the Message status subresource.
async fn update_status(
    client: &Client,
    mg: &Message,
    at_provider: Option<MessageObservation>,
    next: Vec<Condition>,
) -> Result<(), OperatorError> {
    let now = k8s_openapi::chrono::Utc::now().to_rfc3339();
    let conditions = merge_conditions(mg.conditions(), next, &now);

    let mut status = serde_json::json!({ "conditions": conditions });
    if let Some(at_provider) = at_provider {
        status["atProvider"] = serde_json::to_value(at_provider)?;
    }
    let patch = serde_json::json!({ "status": status });

    let api: Api<Message> = Api::all(client.clone());
    api.patch_status(
        &mg.name_any(),
        &PatchParams::apply(FIELD_MANAGER),
        &Patch::Merge(&patch),
    )
    .await?;
    Ok(())
}

/// Error policy.
fn error_policy(_mg: Arc<Message>, error: &OperatorError, _ctx: Arc<Context>) -> Action {
    warn!("Message reconciliation error: {error}");
    if error.is_transient() {
        Action::requeue(Duration::from_secs(defaults::REQUEUE_TRANSIENT_ERROR_SECS))
    } else {
        Action::requeue(Duration::from_secs(defaults::REQUEUE_PERMANENT_ERROR_SECS))
    }
}
