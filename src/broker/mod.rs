//! Ingestion queue publisher.
//!
//! The gateway holds exactly one broker connection and one channel for its
//! whole lifetime. All publishes from all in-flight requests funnel through
//! that channel, one at a time, and a publish only reports success once the
//! broker has confirmed it.

mod reconnect;

use async_trait::async_trait;
use lapin::options::{BasicPublishOptions, ConfirmSelectOptions, QueueDeclareOptions};
use lapin::publisher_confirm::Confirmation;
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{ConnectError, PublishError};
use crate::task::TaskMessage;

pub use reconnect::{connect_with_retry, ConnectState, ReconnectPolicy, Sleeper, TokioSleeper};

/// Queue the ingestion workers consume from.
pub const DEFAULT_QUEUE: &str = "ingestion_queue";

/// AMQP persistent delivery mode.
const PERSISTENT: u8 = 2;

/// Something that can hand a task to the ingestion queue.
///
/// `publish` returns only after the message is acknowledged by the broker. An
/// error means the task was not accepted; the caller decides what that means
/// for the surrounding request.
#[async_trait]
pub trait TaskPublisher: Send + Sync {
    async fn publish(&self, message: &TaskMessage) -> Result<(), PublishError>;
}

/// Where and how to reach the broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub url: String,
    pub queue: String,
    pub reconnect: ReconnectPolicy,
}

impl BrokerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            queue: DEFAULT_QUEUE.to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }

    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = queue.into();
        self
    }

    pub fn with_reconnect(mut self, policy: ReconnectPolicy) -> Self {
        self.reconnect = policy;
        self
    }
}

/// Publisher backed by a single AMQP connection and confirm-mode channel.
pub struct AmqpPublisher {
    connection: Connection,
    channel: Mutex<Channel>,
    queue: String,
}

impl AmqpPublisher {
    /// Connect with the configured retry policy, then open a channel in
    /// confirm mode and declare the durable queue.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, ConnectError> {
        Self::connect_with_sleeper(config, &TokioSleeper).await
    }

    pub async fn connect_with_sleeper(
        config: &BrokerConfig,
        sleeper: &dyn Sleeper,
    ) -> Result<Self, ConnectError> {
        let url = config.url.as_str();
        let connection = connect_with_retry(&config.reconnect, sleeper, |_attempt| {
            Connection::connect(url, ConnectionProperties::default())
        })
        .await?;

        match open_channel(&connection, &config.queue).await {
            Ok(channel) => {
                info!(queue = %config.queue, "Broker channel ready");
                Ok(Self {
                    connection,
                    channel: Mutex::new(channel),
                    queue: config.queue.clone(),
                })
            }
            Err(err) => {
                if let Err(close_err) = connection.close(0, "channel setup failed").await {
                    debug!(error = %close_err, "Closing broker connection after setup failure");
                }
                Err(ConnectError::Channel(err.to_string()))
            }
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Close the channel, then the connection.
    pub async fn close(&self) {
        let channel = self.channel.lock().await;
        if let Err(err) = channel.close(200, "gateway shutdown").await {
            warn!(error = %err, "Failed to close broker channel");
        }
        if let Err(err) = self.connection.close(200, "gateway shutdown").await {
            warn!(error = %err, "Failed to close broker connection");
        }
        info!("Broker connection closed");
    }
}

async fn open_channel(connection: &Connection, queue: &str) -> lapin::Result<Channel> {
    let channel = connection.create_channel().await?;
    let prepared = async {
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..QueueDeclareOptions::default()
                },
                FieldTable::default(),
            )
            .await?;
        lapin::Result::Ok(())
    }
    .await;

    match prepared {
        Ok(()) => Ok(channel),
        Err(err) => {
            if let Err(close_err) = channel.close(0, "setup failed").await {
                debug!(error = %close_err, "Closing broker channel after setup failure");
            }
            Err(err)
        }
    }
}

#[async_trait]
impl TaskPublisher for AmqpPublisher {
    async fn publish(&self, message: &TaskMessage) -> Result<(), PublishError> {
        let body = message.to_json()?;
        let properties = BasicProperties::default()
            .with_delivery_mode(PERSISTENT)
            .with_content_type("application/json".into());

        let channel = self.channel.lock().await;
        let confirmation = channel
            .basic_publish(
                "",
                &self.queue,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|e| PublishError::Channel(e.to_string()))?
            .await
            .map_err(|e| PublishError::Channel(e.to_string()))?;
        drop(channel);

        match confirmation {
            Confirmation::Ack(_) => {
                debug!(task_id = %message.task_id, queue = %self.queue, "Task published");
                Ok(())
            }
            Confirmation::Nack(_) => Err(PublishError::Nacked {
                task_id: message.task_id.clone(),
            }),
            Confirmation::NotRequested => Err(PublishError::Channel(
                "channel is not in confirm mode".to_string(),
            )),
        }
    }
}
