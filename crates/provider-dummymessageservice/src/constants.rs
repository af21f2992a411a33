/// Kubernetes label keys following the app.kubernetes.io convention.
pub mod labels {
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";

    /// Provider-specific labels.
    pub const PROVIDER_CONFIG: &str = "dummymessageservice.crossplane.io/provider-config";
}

/// Label values.
pub mod values {
    pub const MANAGED_BY: &str = "provider-dummymessageservice";
}

/// Finalizer guarding deletion of the external message.
pub const FINALIZER: &str = "finalizer.managedresource.crossplane.io";

/// Field manager used for status patches and server-side apply.
pub const FIELD_MANAGER: &str = "provider-dummymessageservice";

/// Condition types and reasons reported on managed resources.
pub mod conditions {
    pub const READY: &str = "Ready";
    pub const SYNCED: &str = "Synced";

    pub const REASON_AVAILABLE: &str = "Available";
    pub const REASON_CREATING: &str = "Creating";
    pub const REASON_DELETING: &str = "Deleting";
    pub const REASON_RECONCILE_SUCCESS: &str = "ReconcileSuccess";
    pub const REASON_RECONCILE_ERROR: &str = "ReconcileError";
    pub const REASON_IN_USE: &str = "InUse";
    pub const REASON_UNUSED: &str = "Unused";
}

/// Location of the message service inside the cluster.
pub mod service {
    pub const NAMESPACE: &str = "dummy-message-service";
    pub const NAME: &str = "dummy-message-service-svc";
    pub const PORT: u16 = 8000;
}

/// Default values.
pub mod defaults {
    pub const PROVIDER_CONFIG_NAME: &str = "default";
    pub const LOG_LEVEL: &str = "info";
    pub const METRICS_ADDR: &str = "0.0.0.0:8080";
    pub const HTTP_TIMEOUT_SECS: u64 = 10;
    pub const MAX_RECONCILE_RATE: u16 = 10;

    /// Requeue intervals in seconds.
    pub const POLL_INTERVAL_SECS: u64 = 60;
    pub const REQUEUE_CREATING_SECS: u64 = 5;
    pub const REQUEUE_PROVIDER_CONFIG_SECS: u64 = 60;
    pub const REQUEUE_TRANSIENT_ERROR_SECS: u64 = 15;
    pub const REQUEUE_PERMANENT_ERROR_SECS: u64 = 300;
}

/// Base URL of the message service, built from its in-cluster Service DNS name.
pub fn default_message_service_url() -> String {
    format!(
        "http://{}.{}.svc.cluster.local:{}",
        service::NAME,
        service::NAMESPACE,
        service::PORT
    )
}
