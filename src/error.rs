use thiserror::Error;

/// Failures returned by targeted operations on the engine. None of these are fatal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Signal not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidArgument(String),
}

/// Why a snapshot could not be handed to one observer.
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("observer queue is full")]
    Full,

    #[error("observer disconnected")]
    Closed,

    #[error("sink error: {0}")]
    Sink(String),
}
