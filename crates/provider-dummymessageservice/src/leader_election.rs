//! Lease-based leader election so only one provider replica reconciles.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use k8s_openapi::api::coordination::v1::{Lease, LeaseSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, PostParams};
use kube::Client;
use tracing::{debug, error, info, warn};

use crate::metrics;

/// Annotation key for storing the renew epoch timestamp.
const ANNOTATION_RENEW_EPOCH: &str = "dummymessageservice.crossplane.io/renew-epoch";

/// Configuration for Lease-based leader election.
#[derive(Clone, Debug)]
pub struct LeaderElectionConfig {
    /// Name of the Lease object.
    pub lease_name: String,
    /// Namespace where the Lease lives.
    pub namespace: String,
    /// Identity of this provider instance (typically the pod name).
    pub holder_id: String,
    /// Seconds the lease stays valid without renewal.
    pub lease_duration_secs: i32,
    /// Seconds between renewal attempts.
    pub renew_interval_secs: u64,
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        let holder_id = std::env::var("POD_NAME")
            .unwrap_or_else(|_| format!("provider-dummymessageservice-{}", uuid::Uuid::new_v4()));
        let namespace =
            std::env::var("POD_NAMESPACE").unwrap_or_else(|_| "crossplane-system".into());

        Self {
            lease_name: "provider-dummymessageservice-leader".into(),
            namespace,
            holder_id,
            lease_duration_secs: 15,
            renew_interval_secs: 5,
        }
    }
}

/// Leader flag shared between the election loop and the controllers.
#[derive(Clone, Default)]
pub struct LeaderStatus {
    is_leader: Arc<AtomicBool>,
}

impl LeaderStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::Relaxed)
    }

    /// Used when leader election is disabled.
    pub fn force_leader(&self) {
        self.set_leader(true);
    }

    fn set_leader(&self, v: bool) {
        self.is_leader.store(v, Ordering::Relaxed);
        metrics::set_leader(v);
    }

    /// Resolve once this instance holds leadership.
    pub async fn wait_for_leadership(&self, poll: Duration) {
        while !self.is_leader() {
            tokio::time::sleep(poll).await;
        }
    }

    /// Resolve once this instance no longer holds leadership.
    pub async fn wait_for_loss(&self, poll: Duration) {
        while self.is_leader() {
            tokio::time::sleep(poll).await;
        }
    }
}

/// Drive `work` for as long as leadership is held.
///
/// Returns an error as soon as leadership is lost; `work` is dropped at that
/// point so no reconcile runs alongside the new leader.
pub async fn run_while_leader<F: Future>(
    status: &LeaderStatus,
    poll: Duration,
    work: F,
) -> anyhow::Result<F::Output> {
    tokio::select! {
        out = work => Ok(out),
        _ = status.wait_for_loss(poll) => {
            Err(anyhow::anyhow!("leadership lost, refusing to keep reconciling"))
        }
    }
}

/// Run the leader election loop. Never returns.
pub async fn run(client: Client, config: LeaderElectionConfig, status: LeaderStatus) {
    let api: Api<Lease> = Api::namespaced(client, &config.namespace);

    loop {
        match try_acquire_or_renew(&api, &config).await {
            Ok(acquired) => {
                if acquired && !status.is_leader() {
                    info!(holder = %config.holder_id, lease = %config.lease_name, "Acquired leadership");
                } else if !acquired && status.is_leader() {
                    warn!(holder = %config.holder_id, "Lost leadership");
                }
                status.set_leader(acquired);
            }
            Err(e) => {
                error!("Leader election error: {e}");
                status.set_leader(false);
            }
        }

        tokio::time::sleep(Duration::from_secs(config.renew_interval_secs)).await;
    }
}

/// Release the lease on shutdown so a standby can take over immediately.
pub async fn step_down(client: &Client, config: &LeaderElectionConfig) {
    let api: Api<Lease> = Api::namespaced(client.clone(), &config.namespace);

    let existing = match api.get(&config.lease_name).await {
        Ok(l) => l,
        Err(e) => {
            debug!("Could not read lease for step-down: {e}");
            return;
        }
    };
    if holder_of(&existing) != Some(config.holder_id.as_str()) {
        return;
    }

    let mut updated = existing;
    if let Some(ref mut s) = updated.spec {
        s.holder_identity = None;
        s.lease_duration_seconds = Some(1);
    }
    match api
        .replace(&config.lease_name, &PostParams::default(), &updated)
        .await
    {
        Ok(_) => info!("Stepped down from leadership"),
        Err(e) => warn!("Failed to step down: {e}"),
    }
}

fn epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

fn holder_of(lease: &Lease) -> Option<&str> {
    lease.spec.as_ref().and_then(|s| s.holder_identity.as_deref())
}

/// A lease without a renew stamp counts as expired.
fn lease_expired(renew_epoch: Option<u64>, duration_secs: u64, now: u64) -> bool {
    match renew_epoch {
        Some(ts) => now > ts.saturating_add(duration_secs),
        None => true,
    }
}

fn stamp(lease: &mut Lease, now: u64) {
    lease
        .metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(ANNOTATION_RENEW_EPOCH.to_string(), now.to_string());
}

/// Replace the lease; a 409 means another replica won the race.
async fn replace_lease(api: &Api<Lease>, name: &str, lease: &Lease) -> anyhow::Result<bool> {
    match api.replace(name, &PostParams::default(), lease).await {
        Ok(_) => Ok(true),
        Err(kube::Error::Api(e)) if e.code == 409 => {
            debug!("Conflict updating lease");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

async fn try_acquire_or_renew(
    api: &Api<Lease>,
    config: &LeaderElectionConfig,
) -> anyhow::Result<bool> {
    let now = epoch_secs();

    match api.get(&config.lease_name).await {
        Ok(existing) => {
            if holder_of(&existing) == Some(config.holder_id.as_str()) {
                let mut renewed = existing;
                stamp(&mut renewed, now);
                return replace_lease(api, &config.lease_name, &renewed).await;
            }

            let renew_epoch = existing
                .metadata
                .annotations
                .as_ref()
                .and_then(|a| a.get(ANNOTATION_RENEW_EPOCH))
                .and_then(|s| s.parse().ok());
            let duration = existing
                .spec
                .as_ref()
                .and_then(|s| s.lease_duration_seconds)
                .unwrap_or(config.lease_duration_secs) as u64;

            if !lease_expired(renew_epoch, duration, now) {
                debug!(holder = ?holder_of(&existing), "Lease held by another instance");
                return Ok(false);
            }

            let mut taken = existing;
            if let Some(ref mut s) = taken.spec {
                s.lease_transitions = Some(s.lease_transitions.unwrap_or(0) + 1);
                s.holder_identity = Some(config.holder_id.clone());
            }
            stamp(&mut taken, now);
            replace_lease(api, &config.lease_name, &taken).await
        }
        Err(kube::Error::Api(e)) if e.code == 404 => {
            let mut lease = Lease {
                metadata: ObjectMeta {
                    name: Some(config.lease_name.clone()),
                    namespace: Some(config.namespace.clone()),
                    ..Default::default()
                },
                spec: Some(LeaseSpec {
                    holder_identity: Some(config.holder_id.clone()),
                    lease_duration_seconds: Some(config.lease_duration_secs),
                    lease_transitions: Some(0),
                    ..Default::default()
                }),
            };
            stamp(&mut lease, now);

            match api.create(&PostParams::default(), &lease).await {
                Ok(_) => Ok(true),
                Err(kube::Error::Api(e)) if e.code == 409 => {
                    debug!("Lease already created by another instance");
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        }
        Err(e) => Err(e.into()),
    }
}
