// AMQP broker adapter
// reason: lapin speaks AMQP 0-9-1 on tokio; one Connection per endpoint
use async_trait::async_trait;
use lapin::options::{BasicGetOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tracing::debug;

use loadgen_core::config::redact_url;
use loadgen_core::port::{BrokerChannel, BrokerConnection, BrokerConnector, BrokerError, QueueOptions};

/// Reply code sent when closing a connection or channel normally
const REPLY_SUCCESS: u16 = 200;
const REPLY_TEXT: &str = "OK";

/// Default (nameless) exchange: routing key is the queue name
const DEFAULT_EXCHANGE: &str = "";

/// Connects to RabbitMQ (or any AMQP 0-9-1 broker) with lapin
#[derive(Debug, Clone, Copy, Default)]
pub struct AmqpConnector;

impl AmqpConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BrokerConnector for AmqpConnector {
    async fn connect(&self, url: &str, connection_name: &str) -> Result<Box<dyn BrokerConnection>, BrokerError> {
        let properties = ConnectionProperties::default().with_connection_name(connection_name.to_string().into());

        let connection = Connection::connect(url, properties)
            .await
            .map_err(|e| BrokerError::Connect {
                url: redact_url(url),
                reason: e.to_string(),
            })?;

        debug!(url = %redact_url(url), name = connection_name, "AMQP connection established");
        Ok(Box::new(AmqpConnection { connection }))
    }
}

/// One AMQP connection owned by one endpoint
pub struct AmqpConnection {
    connection: Connection,
}

#[async_trait]
impl BrokerConnection for AmqpConnection {
    async fn open_channel(&self) -> Result<Box<dyn BrokerChannel>, BrokerError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| BrokerError::Channel(e.to_string()))?;
        Ok(Box::new(AmqpChannel { channel }))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.connection.status().connected() {
            return Ok(());
        }
        self.connection
            .close(REPLY_SUCCESS, REPLY_TEXT)
            .await
            .map_err(|e| BrokerError::Close(e.to_string()))
    }
}

/// Channel bound to an [`AmqpConnection`]
pub struct AmqpChannel {
    channel: Channel,
}

#[async_trait]
impl BrokerChannel for AmqpChannel {
    async fn declare_queue(&self, queue: &str, options: QueueOptions) -> Result<(), BrokerError> {
        self.channel
            .queue_declare(queue, declare_options(options), FieldTable::default())
            .await
            .map_err(|e| BrokerError::Declare {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn publish(&self, routing_key: &str, payload: &[u8]) -> Result<(), BrokerError> {
        let to_error = |e: lapin::Error| BrokerError::Publish {
            queue: routing_key.to_string(),
            reason: e.to_string(),
        };

        self.channel
            .basic_publish(
                DEFAULT_EXCHANGE,
                routing_key,
                BasicPublishOptions::default(),
                payload,
                BasicProperties::default(),
            )
            .await
            .map_err(to_error)?
            .await
            .map_err(to_error)?;
        Ok(())
    }

    async fn fetch_one(&self, queue: &str, manual_ack: bool) -> Result<Option<Vec<u8>>, BrokerError> {
        let message = self
            .channel
            .basic_get(queue, get_options(manual_ack))
            .await
            .map_err(|e| BrokerError::Fetch {
                queue: queue.to_string(),
                reason: e.to_string(),
            })?;
        Ok(message.map(|m| m.delivery.data))
    }

    async fn close(&self) -> Result<(), BrokerError> {
        if !self.channel.status().connected() {
            return Ok(());
        }
        self.channel
            .close(REPLY_SUCCESS, REPLY_TEXT)
            .await
            .map_err(|e| BrokerError::Close(e.to_string()))
    }
}

fn declare_options(options: QueueOptions) -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: options.durable,
        exclusive: options.exclusive,
        auto_delete: options.auto_delete,
        ..QueueDeclareOptions::default()
    }
}

fn get_options(manual_ack: bool) -> BasicGetOptions {
    BasicGetOptions { no_ack: !manual_ack }
}
