// Endpoint - one broker connection bound to one queue

use crate::application::worker::constants::POLL_MANUAL_ACK;
use crate::domain::{EndpointId, OperationOutcome, Payload, Role};
use crate::port::{BrokerChannel, BrokerConnection, BrokerConnector, BrokerError, QueueOptions};
use tracing::{info, warn};

/// Everything needed to open an endpoint
#[derive(Debug, Clone)]
pub struct EndpointSpec {
    pub id: EndpointId,
    pub role: Role,
    pub url: String,
    pub queue: String,
    pub payload: Payload,
}

/// An open connection + channel with its queue declared
///
/// Owns its connection exclusively. Resources are acquired in [`Endpoint::open`]
/// and released by [`Endpoint::close`].
pub struct Endpoint {
    id: EndpointId,
    role: Role,
    queue: String,
    payload: Payload,
    connection: Box<dyn BrokerConnection>,
    channel: Box<dyn BrokerChannel>,
}

impl Endpoint {
    /// Connect, open a channel and declare the queue
    pub async fn open(connector: &dyn BrokerConnector, spec: EndpointSpec) -> Result<Self, BrokerError> {
        let connection = connector.connect(&spec.url, spec.id.as_str()).await?;

        let channel = match connection.open_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                release_connection(&spec.id, connection.as_ref()).await;
                return Err(e);
            }
        };

        if let Err(e) = channel.declare_queue(&spec.queue, QueueOptions::default()).await {
            if let Err(close_error) = channel.close().await {
                warn!(endpoint = %spec.id, error = %close_error, "Failed to release channel after setup error");
            }
            release_connection(&spec.id, connection.as_ref()).await;
            return Err(e);
        }

        info!(endpoint = %spec.id, queue = %spec.queue, "Create {} for {}", spec.id, spec.queue);

        Ok(Self {
            id: spec.id,
            role: spec.role,
            queue: spec.queue,
            payload: spec.payload,
            connection,
            channel,
        })
    }

    pub fn id(&self) -> &EndpointId {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Send the fixed payload to the bound queue via the default exchange
    pub async fn publish(&self) -> Result<OperationOutcome, BrokerError> {
        self.channel.publish(&self.queue, self.payload.as_bytes()).await?;
        Ok(OperationOutcome::Published {
            bytes: self.payload.len(),
        })
    }

    /// Fetch at most one message without waiting, auto-acknowledged
    pub async fn poll(&self) -> Result<OperationOutcome, BrokerError> {
        match self.channel.fetch_one(&self.queue, POLL_MANUAL_ACK).await? {
            Some(body) => Ok(OperationOutcome::MessageReceived { bytes: body.len() }),
            None => Ok(OperationOutcome::QueueEmpty),
        }
    }

    /// Run this endpoint's role operation once
    pub async fn perform(&self) -> Result<OperationOutcome, BrokerError> {
        match self.role {
            Role::Publish => self.publish().await,
            Role::Consume => self.poll().await,
        }
    }

    /// Close channel then connection
    pub async fn close(self) -> Result<(), BrokerError> {
        let channel_result = self.channel.close().await;
        let connection_result = self.connection.close().await;
        channel_result.and(connection_result)
    }
}

async fn release_connection(id: &EndpointId, connection: &dyn BrokerConnection) {
    if let Err(e) = connection.close().await {
        warn!(endpoint = %id, error = %e, "Failed to release connection after setup error");
    }
}
