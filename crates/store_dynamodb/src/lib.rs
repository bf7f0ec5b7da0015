use async_trait::async_trait;
use aws_sdk_dynamodb::config::http::HttpResponse;
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::delete_item::{DeleteItemError, DeleteItemOutput};
use aws_sdk_dynamodb::operation::get_item::{GetItemError, GetItemOutput};
use aws_sdk_dynamodb::operation::put_item::{PutItemError, PutItemOutput};
use aws_sdk_dynamodb::types::AttributeValue;
use model::record::{to_record, WidgetRecord, OWNER, WIDGET_ID};
use model::WidgetChangeRequest;
use std::collections::HashMap;
use store::StoreErrorReason::{BadState, MissingEntry};
use store::StoreOperation::{DeleteWidget, ProbeWidget, SaveWidget};
use store::{RecordStore, StoreError};

/// Widget records in a DynamoDB table keyed by `widget_id` and `owner`.
pub struct DynamoDbRecordStore {
    table_name: String,
    dynamodb_client: aws_sdk_dynamodb::Client,
    consistent_read: bool,
}

impl DynamoDbRecordStore {
    pub fn new(dynamodb_client: aws_sdk_dynamodb::Client, table_name: impl Into<String>) -> Self {
        let table_name: String = table_name.into();
        tracing::info!("DynamoDB record store initialised for table {table_name}");

        DynamoDbRecordStore {
            table_name,
            dynamodb_client,
            consistent_read: true,
        }
    }

    /// Whether existence probes use strongly consistent reads, on by default.
    pub fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }

    fn key(widget_id: &str, owner: &str) -> HashMap<String, AttributeValue> {
        [(WIDGET_ID, widget_id), (OWNER, owner)]
            .iter()
            .map(|&(k, v)| (k.to_string(), AttributeValue::S(v.to_string())))
            .collect()
    }

    fn describe(widget_id: &str, owner: &str) -> String {
        format!("({widget_id}, {owner})")
    }

    async fn probe(&self, widget: &WidgetChangeRequest) -> Result<(), StoreError> {
        let record_key: String = Self::describe(&widget.widget_id, &widget.owner);

        let output: GetItemOutput = self
            .get_item(Self::key(&widget.widget_id, &widget.owner))
            .await
            .map_err(|err| StoreError::backend(&record_key, ProbeWidget, err))?;

        match output.item {
            Some(_) => Ok(()),
            None => Err(StoreError::new(record_key, ProbeWidget, MissingEntry)),
        }
    }

    async fn get_item(
        &self,
        key: HashMap<String, AttributeValue>,
    ) -> Result<GetItemOutput, SdkError<GetItemError, HttpResponse>> {
        self.dynamodb_client
            .get_item()
            .table_name(&self.table_name)
            .consistent_read(self.consistent_read)
            .set_key(Some(key))
            .send()
            .await
    }

    async fn put_item(
        &self,
        item: HashMap<String, AttributeValue>,
    ) -> Result<PutItemOutput, SdkError<PutItemError, HttpResponse>> {
        self.dynamodb_client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
    }

    async fn delete_item(
        &self,
        key: HashMap<String, AttributeValue>,
    ) -> Result<DeleteItemOutput, SdkError<DeleteItemError, HttpResponse>> {
        self.dynamodb_client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(key))
            .send()
            .await
    }
}

#[async_trait]
impl RecordStore for DynamoDbRecordStore {
    async fn save_widget(&self, widget: &WidgetChangeRequest) -> Result<(), StoreError> {
        let record_key: String = Self::describe(&widget.widget_id, &widget.owner);

        let record: WidgetRecord = to_record(widget)
            .map_err(|err| StoreError::new(record_key.clone(), SaveWidget, err.into()))?;

        let item: HashMap<String, AttributeValue> =
            serde_dynamo::to_item(&record).map_err(|err| {
                StoreError::new(record_key.clone(), SaveWidget, BadState(err.to_string()))
            })?;

        self.put_item(item)
            .await
            .map_err(|err| StoreError::backend(&record_key, SaveWidget, err))?;

        tracing::info!("Saved widget {} in DynamoDB", widget.widget_id);
        Ok(())
    }

    async fn delete_widget(&self, widget_id: &str, owner: &str) -> bool {
        let record_key: String = Self::describe(widget_id, owner);

        match self.delete_item(Self::key(widget_id, owner)).await {
            Ok(_) => {
                tracing::info!("Deleted widget {widget_id} from DynamoDB");
                true
            }
            Err(err) => {
                let err: StoreError = StoreError::backend(&record_key, DeleteWidget, err);
                tracing::error!("Failed to delete widget from DynamoDB, {err}");
                false
            }
        }
    }

    async fn update_widget(&self, widget: &WidgetChangeRequest) -> bool {
        if let Err(err) = self.probe(widget).await {
            tracing::error!("Not updating widget {} in DynamoDB, {err}", widget.widget_id);
            return false;
        }

        match self.save_widget(widget).await {
            Ok(()) => true,
            Err(err) => {
                tracing::error!("Failed to update widget in DynamoDB, {err}");
                false
            }
        }
    }
}
