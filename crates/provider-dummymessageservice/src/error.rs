use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Message service error: {0}")]
    MessageService(String),

    #[error("Credentials error: {0}")]
    Credentials(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A connector step failed; `step` names which one.
    #[error("{step}: {source}")]
    Connect {
        step: &'static str,
        #[source]
        source: Box<OperatorError>,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Finalizer error: {0}")]
    Finalizer(String),
}

pub type Result<T> = std::result::Result<T, OperatorError>;

impl OperatorError {
    /// Wrap an error with the connector step that produced it.
    pub fn connect(step: &'static str, source: OperatorError) -> Self {
        OperatorError::Connect {
            step,
            source: Box::new(source),
        }
    }

    /// Whether this error is transient and the reconciliation should be retried soon.
    pub fn is_transient(&self) -> bool {
        match self {
            OperatorError::Kube(_) | OperatorError::Http(_) | OperatorError::MessageService(_) => {
                true
            }
            OperatorError::Connect { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_service_error_is_transient() {
        assert!(OperatorError::MessageService("boom".into()).is_transient());
    }

    #[test]
    fn test_config_error_is_permanent() {
        assert!(!OperatorError::Config("bad".into()).is_transient());
        assert!(!OperatorError::Credentials("missing".into()).is_transient());
    }

    #[test]
    fn test_connect_error_inherits_transience() {
        let err = OperatorError::connect(
            "cannot get ProviderConfig",
            OperatorError::MessageService("unreachable".into()),
        );
        assert!(err.is_transient());

        let err = OperatorError::connect(
            "cannot get credentials",
            OperatorError::Credentials("no key".into()),
        );
        assert!(!err.is_transient());
    }

    #[test]
    fn test_connect_error_display() {
        let err = OperatorError::connect(
            "cannot get credentials",
            OperatorError::Credentials("key 'token' missing".into()),
        );
        assert_eq!(
            err.to_string(),
            "cannot get credentials: Credentials error: key 'token' missing"
        );
    }
}
