use async_trait::async_trait;
use model::record::{to_record, WidgetRecord};
use model::{widget_key, WidgetChangeRequest};
use serde_json::Value;
use source::{AckToken, SourceError, SourceItem, SourceReader};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use store::StoreErrorReason::{BackendFailure, BadState};
use store::StoreOperation::{DeleteWidget, ProbeWidget, SaveWidget};
use store::{BlobStore, RecordStore, StoreError, StoreOperation};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ordered record of the store calls made, shareable between stores.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    fn push(&self, call: String) {
        lock(&self.0).push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        lock(&self.0).clone()
    }
}

/// Operations set to fail, shared by clones of a store.
#[derive(Clone, Default)]
struct Failures(Arc<Mutex<HashSet<StoreOperation>>>);

impl Failures {
    fn check(&self, key: &str, operation: StoreOperation) -> Result<(), StoreError> {
        if lock(&self.0).contains(&operation) {
            return Err(StoreError::new(
                key.to_string(),
                operation,
                BackendFailure("injected failure".into()),
            ));
        }

        Ok(())
    }
}

/// Blob store holding documents in a map, keyed like the S3 store.
#[derive(Clone, Default)]
pub struct InMemoryBlobStore {
    documents: Arc<Mutex<HashMap<String, Value>>>,
    failures: Failures,
    log: CallLog,
}

impl InMemoryBlobStore {
    pub fn with_log(log: CallLog) -> Self {
        InMemoryBlobStore {
            log,
            ..Default::default()
        }
    }

    /// Make every subsequent `operation` fail with a backend error.
    pub fn fail(&self, operation: StoreOperation) {
        lock(&self.failures.0).insert(operation);
    }

    pub fn document(&self, key: &str) -> Option<Value> {
        lock(&self.documents).get(key).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.documents).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write(&self, widget: &WidgetChangeRequest, key: &str) -> Result<(), StoreError> {
        self.failures.check(key, SaveWidget)?;

        let document: Value = serde_json::to_value(widget).map_err(|err| {
            StoreError::new(key.to_string(), SaveWidget, BadState(err.to_string()))
        })?;
        lock(&self.documents).insert(key.to_string(), document);

        Ok(())
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn save_widget(
        &self,
        widget: &WidgetChangeRequest,
        owner: &str,
        widget_id: &str,
    ) -> Result<(), StoreError> {
        let key: String = widget_key(owner, widget_id);
        self.log.push(format!("blob:save:{key}"));

        self.write(widget, &key)
    }

    async fn delete_widget(&self, owner: &str, widget_id: &str) -> bool {
        let key: String = widget_key(owner, widget_id);
        self.log.push(format!("blob:delete:{key}"));

        if self.failures.check(&key, DeleteWidget).is_err() {
            return false;
        }

        lock(&self.documents).remove(&key);
        true
    }

    async fn update_widget(
        &self,
        widget: &WidgetChangeRequest,
        owner: &str,
        widget_id: &str,
    ) -> bool {
        let key: String = widget_key(owner, widget_id);
        self.log.push(format!("blob:update:{key}"));

        if self.failures.check(&key, ProbeWidget).is_err()
            || !lock(&self.documents).contains_key(&key)
        {
            return false;
        }

        self.write(widget, &key).is_ok()
    }
}

/// Record store holding flattened records keyed by `(widget_id, owner)`.
#[derive(Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<(String, String), WidgetRecord>>>,
    failures: Failures,
    log: CallLog,
}

impl InMemoryRecordStore {
    pub fn with_log(log: CallLog) -> Self {
        InMemoryRecordStore {
            log,
            ..Default::default()
        }
    }

    /// Make every subsequent `operation` fail with a backend error.
    pub fn fail(&self, operation: StoreOperation) {
        lock(&self.failures.0).insert(operation);
    }

    pub fn record(&self, widget_id: &str, owner: &str) -> Option<WidgetRecord> {
        lock(&self.records)
            .get(&(widget_id.to_string(), owner.to_string()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn save_widget(&self, widget: &WidgetChangeRequest) -> Result<(), StoreError> {
        let key: (String, String) = (widget.widget_id.clone(), widget.owner.clone());
        self.log.push(format!("record:save:{}", widget.widget_id));

        self.failures.check(&widget.widget_id, SaveWidget)?;
        let record: WidgetRecord = to_record(widget)
            .map_err(|err| StoreError::new(widget.widget_id.clone(), SaveWidget, err.into()))?;

        lock(&self.records).insert(key, record);
        Ok(())
    }

    async fn delete_widget(&self, widget_id: &str, owner: &str) -> bool {
        self.log.push(format!("record:delete:{widget_id}"));

        if self.failures.check(widget_id, DeleteWidget).is_err() {
            return false;
        }

        lock(&self.records).remove(&(widget_id.to_string(), owner.to_string()));
        true
    }

    async fn update_widget(&self, widget: &WidgetChangeRequest) -> bool {
        self.log.push(format!("record:update:{}", widget.widget_id));

        if self.failures.check(&widget.widget_id, ProbeWidget).is_err()
            || self.record(&widget.widget_id, &widget.owner).is_none()
        {
            return false;
        }

        self.save_widget(widget).await.is_ok()
    }
}

#[derive(Default)]
struct SourceState {
    pending: VecDeque<SourceItem>,
    acknowledged: Vec<AckToken>,
    issued: usize,
    failing_acknowledgements: bool,
}

/// A source backed by an in-memory queue.
///
/// Clones share the same queue, so a test can keep a handle while the
/// synchronizer owns the reader.
#[derive(Clone, Default)]
pub struct InMemorySource {
    state: Arc<Mutex<SourceState>>,
    with_tokens: bool,
}

impl InMemorySource {
    /// Behaves like a queue: items carry a token and must be acknowledged.
    pub fn acknowledged() -> Self {
        InMemorySource {
            with_tokens: true,
            ..Default::default()
        }
    }

    /// Behaves like a bucket: items are removed when read.
    pub fn destructive() -> Self {
        InMemorySource::default()
    }

    pub fn push(&self, request: WidgetChangeRequest) {
        let mut state: MutexGuard<'_, SourceState> = lock(&self.state);
        state.issued += 1;

        let token: Option<AckToken> = self
            .with_tokens
            .then(|| AckToken(format!("ack-{}", state.issued)));

        state.pending.push_back(SourceItem::new(request, token));
    }

    /// Make every subsequent acknowledgement fail with a backend error.
    pub fn fail_acknowledgements(&self) {
        lock(&self.state).failing_acknowledgements = true;
    }

    pub fn pending(&self) -> usize {
        lock(&self.state).pending.len()
    }

    pub fn acknowledgements(&self) -> Vec<AckToken> {
        lock(&self.state).acknowledged.clone()
    }
}

#[async_trait]
impl SourceReader for InMemorySource {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn fetch_next(&mut self) -> Result<Option<SourceItem>, SourceError> {
        Ok(lock(&self.state).pending.pop_front())
    }

    async fn acknowledge(&mut self, token: AckToken) -> Result<(), SourceError> {
        let mut state: MutexGuard<'_, SourceState> = lock(&self.state);

        if state.failing_acknowledgements {
            return Err(SourceError::backend(token.0, "injected failure"));
        }

        state.acknowledged.push(token);
        Ok(())
    }
}
