use model::{Error, RequestKind, WidgetChangeRequest};
use source::{SourceItem, SourceReader};
use std::sync::Arc;
use std::time::Duration;
use store::{BlobStore, RecordStore, StoreError};
use tracing::{Instrument, Span};

/// Idle wait between polls of an empty source.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What processing a single request amounted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Deleted,
    DeleteFailed,
    Updated,
    UpdateFailed,
    Ignored,
}

/// Applies widget change requests to the blob and record stores.
///
/// Requests are handled one at a time in delivery order. There is no
/// transaction across the two stores: a failure between the two writes
/// leaves them diverged and is only reported in the log.
pub struct Synchronizer {
    blob_store: Arc<dyn BlobStore>,
    record_store: Arc<dyn RecordStore>,
    source: Box<dyn SourceReader>,
    poll_interval: Duration,
}

impl Synchronizer {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        record_store: Arc<dyn RecordStore>,
        source: Box<dyn SourceReader>,
    ) -> Self {
        tracing::info!("Synchronizer initialised for source {}", source.name());

        Synchronizer {
            blob_store,
            record_store,
            source,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Poll the source forever, sleeping while it is empty.
    ///
    /// Only returns when an error escapes processing.
    pub async fn run(&mut self) -> Result<(), Error> {
        tracing::info!("Synchronizer started running");

        loop {
            if self.poll_once().await?.is_none() {
                tracing::debug!("No widget request found, sleeping for {:?}", self.poll_interval);
                tokio::time::sleep(self.poll_interval).await;
            }
        }
    }

    /// Fetch and process at most one request.
    pub async fn poll_once(&mut self) -> Result<Option<Outcome>, Error> {
        match self.source.fetch_next().await? {
            Some(item) => self.process_request(item).await.map(Some),
            None => Ok(None),
        }
    }

    /// Apply one request, then acknowledge it if its source requires that.
    ///
    /// The acknowledgement is sent whether or not both stores reported
    /// success; only errors escaping a create skip it.
    pub async fn process_request(&mut self, item: SourceItem) -> Result<Outcome, Error> {
        let SourceItem { request, ack_token } = item;

        let span: Span = tracing::info_span!(
            "Widget request",
            widget_id = %request.widget_id,
            kind = %request.kind
        );

        let outcome: Outcome = self.dispatch(&request).instrument(span.clone()).await?;

        if let Some(token) = ack_token {
            self.source.acknowledge(token).instrument(span).await?;
        }

        Ok(outcome)
    }

    async fn dispatch(&self, request: &WidgetChangeRequest) -> Result<Outcome, StoreError> {
        match request.kind {
            RequestKind::Create => self.create(request).await,
            RequestKind::Delete => Ok(self.delete(request).await),
            RequestKind::Update => Ok(self.update(request).await),
            RequestKind::Unknown => {
                tracing::info!("Unhandled request type for widget {}", request.widget_id);
                Ok(Outcome::Ignored)
            }
        }
    }

    async fn create(&self, request: &WidgetChangeRequest) -> Result<Outcome, StoreError> {
        let owner: String = request.owner_slug();
        let widget_id: &str = &request.widget_id;

        tracing::info!("Processing create request for widget: {widget_id}, owner: {owner}");

        self.blob_store
            .save_widget(request, &owner, widget_id)
            .await?;
        self.record_store.save_widget(request).await?;

        tracing::info!("Successfully processed widget creation: {widget_id}");
        Ok(Outcome::Created)
    }

    async fn delete(&self, request: &WidgetChangeRequest) -> Outcome {
        let owner: String = request.owner_slug();
        let widget_id: &str = &request.widget_id;

        tracing::info!("Processing delete request for widget: {widget_id}, owner: {owner}");

        // Both stores are always attempted
        let blob_deleted: bool = self.blob_store.delete_widget(&owner, widget_id).await;
        let record_deleted: bool = self
            .record_store
            .delete_widget(widget_id, &request.owner)
            .await;

        if blob_deleted && record_deleted {
            tracing::info!("Successfully processed widget deletion: {widget_id}");
            Outcome::Deleted
        } else {
            tracing::error!(
                blob_deleted,
                record_deleted,
                "Failed to delete widget: {widget_id}"
            );
            Outcome::DeleteFailed
        }
    }

    async fn update(&self, request: &WidgetChangeRequest) -> Outcome {
        let owner: String = request.owner_slug();
        let widget_id: &str = &request.widget_id;

        tracing::info!("Processing update request for widget: {widget_id}, owner: {owner}");

        let blob_updated: bool = self
            .blob_store
            .update_widget(request, &owner, widget_id)
            .await;
        let record_updated: bool = self.record_store.update_widget(request).await;

        if blob_updated && record_updated {
            tracing::info!("Successfully processed widget update: {widget_id}");
            Outcome::Updated
        } else {
            tracing::error!(
                blob_updated,
                record_updated,
                "Failed to update widget: {widget_id}"
            );
            Outcome::UpdateFailed
        }
    }
}
