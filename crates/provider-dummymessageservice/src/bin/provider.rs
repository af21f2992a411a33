//! Provider binary: runs the Message and ProviderConfig controllers.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use kube::Client;
use tracing::{error, info};

use provider_dummymessageservice::config::ProviderArgs;
use provider_dummymessageservice::connector::Connector;
use provider_dummymessageservice::constants::defaults;
use provider_dummymessageservice::controllers::{message_controller, provider_config_controller};
use provider_dummymessageservice::leader_election::{self, LeaderElectionConfig, LeaderStatus};
use provider_dummymessageservice::{crds_yaml, metrics, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = ProviderArgs::parse();

    if args.generate_crds {
        print!("{}", crds_yaml()?);
        return Ok(());
    }

    telemetry::init(&args.log_level, args.debug);
    args.validate()?;

    info!(
        message_service = %args.message_service_url,
        poll_interval = args.poll_interval,
        "Starting provider-dummymessageservice"
    );

    let client = Client::try_default().await?;

    let leader = LeaderStatus::new();

    let metrics_addr = args.metrics_addr.clone();
    let readiness = leader.clone();
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr, readiness).await {
            error!("Metrics server failed: {e}");
        }
    });

    let election = if args.leader_election {
        let config = LeaderElectionConfig::default();
        info!(lease = %config.lease_name, holder = %config.holder_id, "Waiting for leadership");
        tokio::spawn(leader_election::run(
            client.clone(),
            config.clone(),
            leader.clone(),
        ));
        leader.wait_for_leadership(Duration::from_secs(1)).await;
        Some(config)
    } else {
        leader.force_leader();
        None
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(defaults::HTTP_TIMEOUT_SECS))
        .build()?;
    let ctx = Arc::new(message_controller::Context {
        client: client.clone(),
        connector: Connector::new(client.clone(), http, args.message_service_url.clone()),
        poll_interval: args.poll_interval(),
    });

    // Both controllers stop on SIGTERM/SIGINT; losing the lease stops them too.
    let controllers = async {
        tokio::join!(
            message_controller::run(ctx, args.max_reconcile_rate),
            provider_config_controller::run(client.clone()),
        )
    };
    if let Err(e) =
        leader_election::run_while_leader(&leader, Duration::from_secs(1), controllers).await
    {
        error!("Stopping controllers: {e}");
        return Err(e);
    }

    if let Some(config) = election {
        leader_election::step_down(&client, &config).await;
    }
    info!("Provider stopped");
    Ok(())
}
