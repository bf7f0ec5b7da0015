use async_trait::async_trait;
use model::WidgetChangeRequest;
use thiserror::Error;

/// Receipt proving a message was received, required to remove it from its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckToken(pub String);

/// A request fetched from a source, with the token needed to acknowledge it if any.
#[derive(Debug, Clone)]
pub struct SourceItem {
    pub request: WidgetChangeRequest,
    pub ack_token: Option<AckToken>,
}

impl SourceItem {
    pub fn new(request: WidgetChangeRequest, ack_token: Option<AckToken>) -> Self {
        Self { request, ack_token }
    }
}

/// A source of widget change requests with at-least-once delivery.
///
/// Sources which remove items as part of the fetch hand out items without a token
/// and never need `acknowledge`.
#[async_trait]
pub trait SourceReader: Send {
    fn name(&self) -> &str;

    /// Next pending request, `None` when the source is currently empty.
    async fn fetch_next(&mut self) -> Result<Option<SourceItem>, SourceError>;

    /// Remove a processed message from the source.
    async fn acknowledge(&mut self, token: AckToken) -> Result<(), SourceError>;
}

/// Errors arising from reading the source.
#[derive(Debug, Error)]
pub enum SourceError {
    // A message body could not be parsed as a request
    #[error("bad request in {location}: {reason}")]
    BadRequest {
        location: String,
        reason: serde_json::Error,
    },
    // A message arrived without something we rely on
    #[error("incomplete message in {location}: missing {field}")]
    IncompleteMessage {
        location: String,
        field: &'static str,
    },
    // An error from the underlying queue or object store
    #[error("backend failure in {location}: {reason}")]
    BackendFailure {
        location: String,
        reason: model::Error,
    },
}

impl SourceError {
    pub fn backend(location: impl Into<String>, reason: impl Into<model::Error>) -> Self {
        SourceError::BackendFailure {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// Parse a message body into a request.
pub fn parse_request(location: &str, body: &[u8]) -> Result<WidgetChangeRequest, SourceError> {
    serde_json::from_slice(body).map_err(|reason| SourceError::BadRequest {
        location: location.to_string(),
        reason,
    })
}
