use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Debug, Clone, Error)]
pub enum BusError {
    /// Failed to connect to the broker.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The broker rejected or failed to acknowledge a message.
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed { topic: String, reason: String },

    /// Failed to subscribe to a topic.
    #[error("Subscription failed for topic '{topic}': {reason}")]
    SubscriptionFailed { topic: String, reason: String },

    /// An error was reported by the transport while consuming.
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Result type for event bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
