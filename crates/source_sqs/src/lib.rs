use async_trait::async_trait;
use aws_sdk_sqs::types::Message;
use model::WidgetChangeRequest;
use source::{parse_request, AckToken, SourceError, SourceItem, SourceReader};
use std::collections::VecDeque;

/// Largest batch SQS will return from a single receive.
pub const MAX_MESSAGES: i32 = 10;

/// Reads widget requests from an SQS queue.
///
/// Each receive asks for a full batch; messages beyond the first are held
/// in a look-ahead buffer and handed out, in received order, before the
/// queue is polled again. Buffered messages are not lost on a crash, they
/// become visible again once their visibility timeout expires.
pub struct SqsSourceReader {
    sqs: aws_sdk_sqs::Client,
    queue_url: String,
    wait_time_seconds: i32,

    buffer: VecDeque<Message>,
}

impl SqsSourceReader {
    /// Resolve the URL of `queue_name` and create a reader for it.
    pub async fn connect(
        sqs: aws_sdk_sqs::Client,
        queue_name: &str,
        wait_time_seconds: i32,
    ) -> Result<Self, SourceError> {
        let output = sqs
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await
            .map_err(|err| SourceError::backend(queue_name, err))?;

        let queue_url: String = output
            .queue_url()
            .ok_or_else(|| SourceError::IncompleteMessage {
                location: queue_name.to_string(),
                field: "queue_url",
            })?
            .to_string();

        tracing::info!("Resolved queue {queue_name} to {queue_url}");

        Ok(Self::new(sqs, queue_url, wait_time_seconds))
    }

    pub fn new(sqs: aws_sdk_sqs::Client, queue_url: String, wait_time_seconds: i32) -> Self {
        SqsSourceReader {
            sqs,
            queue_url,
            wait_time_seconds,
            buffer: VecDeque::with_capacity(MAX_MESSAGES as usize),
        }
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }

    /// Messages received but not yet handed out.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    async fn receive(&self) -> Result<Vec<Message>, SourceError> {
        let output = self
            .sqs
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(MAX_MESSAGES)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|err| SourceError::backend(self.queue_url.as_str(), err))?;

        Ok(output.messages.unwrap_or_default())
    }

    fn to_item(&self, message: Message) -> Result<SourceItem, SourceError> {
        let location: String = match message.message_id() {
            Some(message_id) => format!("{}#{}", self.queue_url, message_id),
            None => self.queue_url.clone(),
        };

        let incomplete = |field: &'static str| SourceError::IncompleteMessage {
            location: location.clone(),
            field,
        };

        let receipt_handle: &str = message
            .receipt_handle()
            .ok_or_else(|| incomplete("receipt_handle"))?;
        let body: &str = message.body().ok_or_else(|| incomplete("body"))?;

        let request: WidgetChangeRequest = parse_request(&location, body.as_bytes())?;

        Ok(SourceItem::new(
            request,
            Some(AckToken(receipt_handle.to_string())),
        ))
    }
}

#[async_trait]
impl SourceReader for SqsSourceReader {
    fn name(&self) -> &str {
        &self.queue_url
    }

    async fn fetch_next(&mut self) -> Result<Option<SourceItem>, SourceError> {
        if self.buffer.is_empty() {
            let messages: Vec<Message> = self.receive().await?;

            if messages.is_empty() {
                tracing::debug!("No widget requests waiting in {}", self.queue_url);
                return Ok(None);
            }

            tracing::info!("Received batch of [{}] from SQS", messages.len());
            self.buffer.extend(messages);
        }

        match self.buffer.pop_front() {
            Some(message) => self.to_item(message).map(Some),
            None => Ok(None),
        }
    }

    async fn acknowledge(&mut self, token: AckToken) -> Result<(), SourceError> {
        self.sqs
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(&token.0)
            .send()
            .await
            .map_err(|err| SourceError::backend(self.queue_url.as_str(), err))?;

        tracing::debug!("Deleted message {} from {}", token.0, self.queue_url);

        Ok(())
    }
}
