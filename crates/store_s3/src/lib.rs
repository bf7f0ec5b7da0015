use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::operation::head_object::HeadObjectError;
use aws_sdk_s3::operation::put_object::{PutObjectError, PutObjectOutput};
use aws_sdk_s3::primitives::ByteStream;
use model::{widget_key, WidgetChangeRequest};
use store::StoreErrorReason::{BackendFailure, BadState, MissingEntry};
use store::StoreOperation::{DeleteWidget, ProbeWidget, SaveWidget};
use store::{BlobStore, StoreError};

mod request_source;

/// Widget documents held in an S3 bucket under `widgets/{owner}/{id}`.
///
/// The same bucket can also act as a request source, see `SourceReader`.
#[derive(Clone)]
pub struct S3BlobStore {
    bucket_name: String,
    s3: aws_sdk_s3::Client,
}

impl S3BlobStore {
    pub fn new(s3: aws_sdk_s3::Client, bucket_name: impl Into<String>) -> Self {
        let bucket_name: String = bucket_name.into();
        tracing::info!("S3 blob store initialised for bucket {bucket_name}");

        S3BlobStore { bucket_name, s3 }
    }

    async fn put_document(
        &self,
        key: &str,
        body: Vec<u8>,
    ) -> Result<PutObjectOutput, SdkError<PutObjectError, HttpResponse>> {
        self.s3
            .put_object()
            .bucket(&self.bucket_name)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(body))
            .send()
            .await
    }

    fn serialize(widget: &WidgetChangeRequest, key: &str) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(widget)
            .map_err(|err| StoreError::new(key.to_string(), SaveWidget, BadState(err.to_string())))
    }

    async fn write(&self, widget: &WidgetChangeRequest, key: &str) -> Result<(), StoreError> {
        let body: Vec<u8> = Self::serialize(widget, key)?;

        self.put_document(key, body)
            .await
            .map_err(|err| StoreError::backend(key, SaveWidget, err))?;

        Ok(())
    }

    /// Lightweight existence check, nothing is reserved by it.
    async fn probe(&self, key: &str) -> Result<(), StoreError> {
        let result: Result<_, SdkError<HeadObjectError, HttpResponse>> = self
            .s3
            .head_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await;

        if let Err(err) = result {
            let not_found: bool = err
                .as_service_error()
                .map(HeadObjectError::is_not_found)
                .unwrap_or(false);

            let reason = if not_found {
                MissingEntry
            } else {
                BackendFailure(err.into())
            };

            return Err(StoreError::new(key.to_string(), ProbeWidget, reason));
        }

        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn save_widget(
        &self,
        widget: &WidgetChangeRequest,
        owner: &str,
        widget_id: &str,
    ) -> Result<(), StoreError> {
        let key: String = widget_key(owner, widget_id);

        self.write(widget, &key).await?;

        tracing::info!("Saved widget {widget_id} for owner {owner} in S3 under {key}");
        Ok(())
    }

    async fn delete_widget(&self, owner: &str, widget_id: &str) -> bool {
        let key: String = widget_key(owner, widget_id);

        let result = self
            .s3
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|err| StoreError::backend(&key, DeleteWidget, err));

        match result {
            Ok(_) => {
                tracing::info!("Deleted widget {widget_id} for owner {owner} from S3");
                true
            }
            Err(err) => {
                tracing::error!("Failed to delete widget from S3, {err}");
                false
            }
        }
    }

    async fn update_widget(
        &self,
        widget: &WidgetChangeRequest,
        owner: &str,
        widget_id: &str,
    ) -> bool {
        let key: String = widget_key(owner, widget_id);

        if let Err(err) = self.probe(&key).await {
            tracing::error!("Not updating widget {widget_id} in S3, {err}");
            return false;
        }

        match self.write(widget, &key).await {
            Ok(()) => {
                tracing::info!("Updated widget {widget_id} for owner {owner} in S3 under {key}");
                true
            }
            Err(err) => {
                tracing::error!("Failed to update widget in S3, {err}");
                false
            }
        }
    }
}
