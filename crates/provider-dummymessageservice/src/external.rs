//! Observe / create / update / delete of the external message behind a
//! [`Message`] resource.

use async_trait::async_trait;
use tracing::{debug, info};

use crate::crds::message::{Message, MessageObservation};
use crate::error::OperatorError;
use crate::message_client::{MessageClient, StoredMessage};

/// Result of observing the external resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalObservation {
    /// False tells the reconciler it has to create the resource.
    pub resource_exists: bool,
    /// False tells the reconciler it has to update the resource.
    pub resource_up_to_date: bool,
    /// Observed fields to record on the resource status.
    pub observed: Option<MessageObservation>,
}

/// Result of creating the external resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalCreation {
    pub observed: MessageObservation,
}

/// Result of updating the external resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExternalUpdate;

/// Operations the managed reconciler drives against the external system.
#[async_trait]
pub trait ExternalClient: Send + Sync {
    async fn observe(&self, mg: &Message) -> Result<ExternalObservation, OperatorError>;
    async fn create(&self, mg: &Message) -> Result<ExternalCreation, OperatorError>;
    async fn update(&self, mg: &Message) -> Result<ExternalUpdate, OperatorError>;
    async fn delete(&self, mg: &Message) -> Result<(), OperatorError>;
}

/// [`ExternalClient`] backed by the dummy message service.
pub struct MessageExternal {
    service: MessageClient,
}

impl MessageExternal {
    pub fn new(service: MessageClient) -> Self {
        Self { service }
    }
}

impl From<StoredMessage> for MessageObservation {
    fn from(m: StoredMessage) -> Self {
        MessageObservation {
            id: Some(m.id),
            content: Some(m.content),
        }
    }
}

#[async_trait]
impl ExternalClient for MessageExternal {
    async fn observe(&self, mg: &Message) -> Result<ExternalObservation, OperatorError> {
        let content = mg.desired_content();
        match self.service.observe(content).await? {
            Some(found) => {
                debug!(id = found.id, "Observed a message with content: '{content}'");
                Ok(ExternalObservation {
                    resource_exists: true,
                    // Content equality is the only drift the service can show.
                    resource_up_to_date: true,
                    observed: Some(found.into()),
                })
            }
            None => {
                debug!("Didn't observe a message with content: '{content}'");
                Ok(ExternalObservation::default())
            }
        }
    }

    async fn create(&self, mg: &Message) -> Result<ExternalCreation, OperatorError> {
        let created = self.service.create(mg.desired_content()).await?;
        info!(id = created.id, content = %created.content, "Created message");
        Ok(ExternalCreation {
            observed: created.into(),
        })
    }

    async fn update(&self, _mg: &Message) -> Result<ExternalUpdate, OperatorError> {
        // The message service has no update endpoint.
        Ok(ExternalUpdate)
    }

    async fn delete(&self, mg: &Message) -> Result<(), OperatorError> {
        let id = match mg.observed_id() {
            Some(id) => id,
            None => match self.service.observe(mg.desired_content()).await? {
                Some(found) => found.id,
                None => {
                    debug!("No message with content '{}' to delete", mg.desired_content());
                    return Ok(());
                }
            },
        };
        self.service.delete(id).await?;
        info!(id, "Deleted message");
        Ok(())
    }
}
