use async_trait::async_trait;
use model::record::ProjectionError;
use model::WidgetChangeRequest;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Stores the full document of each widget, keyed by owner slug and widget id.
///
/// Delete and update report their outcome as a boolean rather than an error,
/// so a failure in one store never prevents the other from being attempted.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Unconditionally write the widget document.
    async fn save_widget(
        &self,
        widget: &WidgetChangeRequest,
        owner: &str,
        widget_id: &str,
    ) -> Result<(), StoreError>;

    async fn delete_widget(&self, owner: &str, widget_id: &str) -> bool;

    /// Overwrite the widget document only if one already exists.
    async fn update_widget(&self, widget: &WidgetChangeRequest, owner: &str, widget_id: &str)
        -> bool;
}

/// Stores a flattened record of each widget, keyed by widget id and owner.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Unconditionally upsert the record projection of the widget.
    async fn save_widget(&self, widget: &WidgetChangeRequest) -> Result<(), StoreError>;

    async fn delete_widget(&self, widget_id: &str, owner: &str) -> bool;

    /// Re-save the widget if a record for it already exists.
    async fn update_widget(&self, widget: &WidgetChangeRequest) -> bool;
}

/// Errors arising from a store operation.
#[derive(Debug, Error)]
#[error("{operation} failed for {key}: {reason}")]
pub struct StoreError {
    pub key: String,

    pub operation: StoreOperation,
    pub reason: StoreErrorReason,
}

#[derive(Debug, Error)]
pub enum StoreErrorReason {
    // An expected entry was missing.
    #[error("missing entry")]
    MissingEntry,
    // The widget couldn't be represented in the store
    #[error("bad state: {0}")]
    BadState(String),
    #[error(transparent)]
    Projection(#[from] ProjectionError),
    // An error from the underlying store
    #[error("backend failure: {0}")]
    BackendFailure(model::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    SaveWidget,
    DeleteWidget,
    ProbeWidget,
}

impl Display for StoreOperation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(format!("{:?}", self).as_str())
    }
}

impl StoreError {
    pub fn new(key: String, operation: StoreOperation, reason: StoreErrorReason) -> Self {
        StoreError {
            key,
            operation,
            reason,
        }
    }

    pub fn backend(key: &str, operation: StoreOperation, reason: impl Into<model::Error>) -> Self {
        StoreError::new(
            key.to_string(),
            operation,
            StoreErrorReason::BackendFailure(reason.into()),
        )
    }
}
