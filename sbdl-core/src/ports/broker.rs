// sbdl-core/src/ports/broker.rs

// What the publisher needs from a message broker, without knowing which one.
// Kafka, a file sink or an in-memory log all fit behind the same outlet.

use async_trait::async_trait;
use miette::Diagnostic;
use thiserror::Error;

/// One message: routed by `key`, carrying the serialized envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerRecord {
    pub topic: String,
    pub key: String,
    pub payload: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAck {
    pub partition: u32,
    pub offset: u64,
}

#[derive(Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum BrokerError {
    #[error("Broker request timed out")]
    #[diagnostic(code(sbdl::broker::timeout))]
    Timeout,

    #[error("No leader available for topic '{0}'")]
    #[diagnostic(code(sbdl::broker::leader_not_available))]
    LeaderNotAvailable(String),

    #[error("Producer buffer is full")]
    #[diagnostic(code(sbdl::broker::queue_full))]
    QueueFull,

    #[error("Broker rejected the record: {0}")]
    #[diagnostic(code(sbdl::broker::rejected))]
    Rejected(String),

    #[error("Broker unreachable: {0}")]
    #[diagnostic(
        code(sbdl::broker::unreachable),
        help("Check the broker address and that the cluster is up.")
    )]
    Unreachable(String),
}

impl BrokerError {
    /// Worth another attempt after a backoff.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout | Self::LeaderNotAvailable(_) | Self::QueueFull
        )
    }

    /// Fatal to the whole run, not just to one record.
    pub fn is_systemic(&self) -> bool {
        matches!(self, Self::Unreachable(_))
    }
}

#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Resolves once the broker acknowledged the record.
    async fn send(&self, record: BrokerRecord) -> Result<DeliveryAck, BrokerError>;

    /// Pushes out anything buffered client-side.
    async fn flush(&self) -> Result<(), BrokerError>;

    fn broker_name(&self) -> &str;
}
