use aws_sdk_s3::error::ErrorMetadata;
use aws_sdk_sqs::operation::delete_message::DeleteMessageOutput;
use aws_sdk_sqs::operation::get_queue_url::GetQueueUrlOutput;
use aws_sdk_sqs::operation::receive_message::ReceiveMessageOutput;
use aws_sdk_sqs::types::Message;
use aws_smithy_mocks::{mock, Rule};
use model::{RequestKind, WidgetChangeRequest};
use serde_json::{json, Value};

/// Test resource names
pub const TEST_BUCKET: &str = "widget_bucket";
pub const TEST_TABLE: &str = "widget_table";
pub const TEST_QUEUE: &str = "widget_queue";
pub const TEST_QUEUE_URL: &str = "https://sqs.local/000000000000/widget_queue";

/// The create payload used across tests.
pub fn create_payload() -> Value {
    json!({
        "type": "create",
        "widgetId": "123",
        "owner": "John Doe",
        "label": "L",
        "description": "D",
        "otherAttributes": [{"name": "color", "value": "red"}]
    })
}

/// Payload carrying only the identifying fields, as sent for deletes.
pub fn identity_payload(kind: &str, widget_id: &str, owner: &str) -> Value {
    json!({
        "type": kind,
        "widgetId": widget_id,
        "owner": owner,
    })
}

pub fn create_request() -> WidgetChangeRequest {
    request_from(create_payload())
}

/// The create request re-labelled as another kind.
pub fn request_of_kind(kind: RequestKind) -> WidgetChangeRequest {
    WidgetChangeRequest {
        kind,
        ..create_request()
    }
}

pub fn request_from(payload: Value) -> WidgetChangeRequest {
    serde_json::from_value(payload).expect("Test payload should be a valid request")
}

/// Generic service error metadata, usable with the `generic` constructor of any operation error.
pub fn service_failure() -> ErrorMetadata {
    ErrorMetadata::builder()
        .code("InternalError")
        .message("injected failure")
        .build()
}

/// An SQS message carrying `body`, with a receipt handle derived from `id`.
pub fn sqs_message(id: &str, body: &Value) -> Message {
    Message::builder()
        .message_id(id)
        .receipt_handle(format!("receipt-{id}"))
        .body(body.to_string())
        .build()
}

/// Resolves any queue name to `TEST_QUEUE_URL`.
pub fn get_queue_url_rule() -> Rule {
    mock!(aws_sdk_sqs::Client::get_queue_url)
        .match_requests(|req| req.queue_name() == Some(TEST_QUEUE))
        .sequence()
        .output(|| {
            GetQueueUrlOutput::builder()
                .queue_url(TEST_QUEUE_URL)
                .build()
        })
        .repeatedly()
        .build()
}

/// Answers receives with each batch in turn.
pub fn receive_rule(batches: Vec<Vec<Message>>) -> Rule {
    let mut builder = mock!(aws_sdk_sqs::Client::receive_message)
        .match_requests(|req| req.queue_url() == Some(TEST_QUEUE_URL))
        .sequence();

    for batch in batches {
        builder = builder.output(move || {
            ReceiveMessageOutput::builder()
                .set_messages(Some(batch.clone()))
                .build()
        });
    }

    builder.build()
}

/// Accepts any number of message deletions.
pub fn delete_message_rule() -> Rule {
    mock!(aws_sdk_sqs::Client::delete_message)
        .match_requests(|req| req.queue_url() == Some(TEST_QUEUE_URL))
        .sequence()
        .output(|| DeleteMessageOutput::builder().build())
        .repeatedly()
        .build()
}
