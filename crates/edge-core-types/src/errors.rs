use redis::RedisError;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Classification carried on `PublishError`/`SubscribeError` so callers can label
/// Prometheus counters without matching on the underlying transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    StreamDisconnect,
    UnexpectedError,
}

impl ErrorClass {
    pub fn as_label(&self) -> &'static str {
        match self {
            ErrorClass::StreamDisconnect => "stream_disconnect",
            ErrorClass::UnexpectedError => "unexpected_error",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PublishError {
    pub class: ErrorClass,
    pub message: String,
}

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "failed to publish ({}): {}", self.class.as_label(), self.message)
    }
}

impl Error for PublishError {}

#[derive(Debug, Clone)]
pub struct SubscribeError {
    pub class: ErrorClass,
    pub message: String,
}

impl Display for SubscribeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "subscription ended ({}): {}", self.class.as_label(), self.message)
    }
}

impl Error for SubscribeError {}

#[derive(Debug, Clone)]
pub enum EdgeError {
    TransportError(String),
    DecodeError(String),
    CacheError(String),
    PublishError(PublishError),
    SubscribeError(SubscribeError),
    PersistenceError(String),
    JsonParseError(String),
    ContextCancelled,
    InvalidAggregationRecord(String),
}

impl Error for EdgeError {}

impl Display for EdgeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeError::TransportError(msg) => write!(f, "transport error: {msg}"),
            EdgeError::DecodeError(msg) => write!(f, "failed to decode event: {msg}"),
            EdgeError::CacheError(msg) => write!(f, "cache error: {msg}"),
            EdgeError::PublishError(e) => write!(f, "{e}"),
            EdgeError::SubscribeError(e) => write!(f, "{e}"),
            EdgeError::PersistenceError(msg) => write!(f, "{msg}"),
            EdgeError::JsonParseError(msg) => write!(f, "{msg}"),
            EdgeError::ContextCancelled => write!(f, "operation cancelled"),
            EdgeError::InvalidAggregationRecord(msg) => {
                write!(f, "cannot aggregate record: {msg}")
            }
        }
    }
}

impl From<RedisError> for EdgeError {
    fn from(err: RedisError) -> Self {
        EdgeError::PersistenceError(format!("error talking to redis: {err}"))
    }
}

impl From<serde_json::Error> for EdgeError {
    fn from(value: serde_json::Error) -> Self {
        EdgeError::JsonParseError(value.to_string())
    }
}

pub type EdgeResult<T> = Result<T, EdgeError>;
