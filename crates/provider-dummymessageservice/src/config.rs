//! Command-line and environment configuration of the provider process.

use std::time::Duration;

use clap::Parser;

use crate::constants::{self, defaults};
use crate::error::OperatorError;

/// Kubernetes provider for the dummy message service.
#[derive(Parser, Debug, Clone)]
#[command(name = "provider", version, about, long_about = None)]
pub struct ProviderArgs {
    /// Run with debug logging.
    #[arg(short, long, env = "PROVIDER_DEBUG")]
    pub debug: bool,

    /// Log level used when RUST_LOG is unset.
    #[arg(long, env = "LOG_LEVEL", default_value = defaults::LOG_LEVEL)]
    pub log_level: String,

    /// How often, in seconds, an available Message is re-observed.
    #[arg(long, env = "POLL_INTERVAL", default_value_t = defaults::POLL_INTERVAL_SECS)]
    pub poll_interval: u64,

    /// Maximum number of Messages reconciled concurrently.
    #[arg(long, env = "MAX_RECONCILE_RATE", default_value_t = defaults::MAX_RECONCILE_RATE)]
    pub max_reconcile_rate: u16,

    /// Use leader election for the controller manager.
    #[arg(short, long, env = "LEADER_ELECTION")]
    pub leader_election: bool,

    /// Base URL of the message service.
    #[arg(long, env = "MESSAGE_SERVICE_URL", default_value_t = constants::default_message_service_url())]
    pub message_service_url: String,

    /// Address of the metrics and health endpoint.
    #[arg(long, env = "METRICS_ADDR", default_value = defaults::METRICS_ADDR)]
    pub metrics_addr: String,

    /// Print the CRDs as YAML and exit.
    #[arg(long)]
    pub generate_crds: bool,
}

impl ProviderArgs {
    pub fn validate(&self) -> Result<(), OperatorError> {
        if self.poll_interval == 0 {
            return Err(OperatorError::Config("poll interval must be positive".into()));
        }
        if self.max_reconcile_rate == 0 {
            return Err(OperatorError::Config(
                "max reconcile rate must be positive".into(),
            ));
        }
        let url = &self.message_service_url;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(OperatorError::Config(format!(
                "message service URL '{url}' must start with http:// or https://"
            )));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }
}
