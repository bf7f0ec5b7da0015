use crate::S3BlobStore;
use async_trait::async_trait;
use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
use model::{WidgetChangeRequest, WIDGET_KEY_PREFIX};
use source::{parse_request, AckToken, SourceError, SourceItem, SourceReader};

impl S3BlobStore {
    /// First key in the bucket which is a pending request rather than a stored widget.
    ///
    /// At most two single-key listings: one from the start of the bucket and,
    /// if that lands on a stored widget, one resuming past the widget prefix.
    async fn next_request_key(&self) -> Result<Option<String>, SourceError> {
        let Some(first) = self.first_key_after(None).await? else {
            return Ok(None);
        };

        if !first.starts_with(WIDGET_KEY_PREFIX) {
            return Ok(Some(first));
        }

        let after_widgets: String = format!("{WIDGET_KEY_PREFIX}{}", char::MAX);

        Ok(self
            .first_key_after(Some(after_widgets))
            .await?
            .filter(|key| !key.starts_with(WIDGET_KEY_PREFIX)))
    }

    async fn first_key_after(
        &self,
        start_after: Option<String>,
    ) -> Result<Option<String>, SourceError> {
        let output: ListObjectsV2Output = self
            .s3
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .max_keys(1)
            .set_start_after(start_after)
            .send()
            .await
            .map_err(|err| SourceError::backend(self.bucket_name.as_str(), err))?;

        Ok(output
            .contents()
            .first()
            .and_then(|object| object.key())
            .map(str::to_string))
    }
}

/// Reading a request deletes it from the bucket, there is nothing to acknowledge.
#[async_trait]
impl SourceReader for S3BlobStore {
    fn name(&self) -> &str {
        &self.bucket_name
    }

    async fn fetch_next(&mut self) -> Result<Option<SourceItem>, SourceError> {
        let Some(key) = self.next_request_key().await? else {
            tracing::debug!("No widget requests found in bucket {}", self.bucket_name);
            return Ok(None);
        };

        tracing::info!("Found widget request {key}");

        let output = self
            .s3
            .get_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|err| SourceError::backend(key.as_str(), err))?;

        let body = output
            .body
            .collect()
            .await
            .map_err(|err| SourceError::backend(key.as_str(), err))?
            .into_bytes();

        self.s3
            .delete_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .send()
            .await
            .map_err(|err| SourceError::backend(key.as_str(), err))?;

        tracing::info!("Read and deleted widget request {key}");

        let request: WidgetChangeRequest = parse_request(&key, &body)?;

        Ok(Some(SourceItem::new(request, None)))
    }

    async fn acknowledge(&mut self, token: AckToken) -> Result<(), SourceError> {
        tracing::debug!("Ignoring acknowledgement {:?}, requests are deleted on read", token);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
    use aws_sdk_s3::operation::get_object::GetObjectOutput;
    use aws_sdk_s3::primitives::ByteStream;
    use aws_sdk_s3::types::Object;
    use aws_smithy_mocks::{mock, mock_client, Rule, RuleMode};
    use model::RequestKind;
    use test_utils::{create_payload, create_request, identity_payload, TEST_BUCKET};

    fn listing(keys: &'static [&'static str], next: Option<&'static str>) -> ListObjectsV2Output {
        let objects: Vec<Object> = keys
            .iter()
            .map(|key| Object::builder().key(*key).build())
            .collect();

        ListObjectsV2Output::builder()
            .set_contents(Some(objects))
            .set_next_continuation_token(next.map(str::to_string))
            .build()
    }

    fn get_rule(key: &'static str, body: String) -> Rule {
        mock!(aws_sdk_s3::Client::get_object)
            .match_requests(move |req| req.key() == Some(key))
            .then_output(move || {
                GetObjectOutput::builder()
                    .body(ByteStream::from(body.clone().into_bytes()))
                    .build()
            })
    }

    fn delete_rule(key: &'static str) -> Rule {
        mock!(aws_sdk_s3::Client::delete_object)
            .match_requests(move |req| req.bucket() == Some(TEST_BUCKET) && req.key() == Some(key))
            .then_output(|| DeleteObjectOutput::builder().build())
    }

    #[tokio::test]
    async fn empty_bucket_yields_nothing() {
        let list: Rule = mock!(aws_sdk_s3::Client::list_objects_v2)
            .then_output(|| ListObjectsV2Output::builder().build());
        let mut source: S3BlobStore =
            S3BlobStore::new(mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&list]), TEST_BUCKET);

        let item: Option<SourceItem> = source.fetch_next().await.expect("Fetch should succeed");

        assert!(item.is_none());
        assert_eq!(1, list.num_calls());
    }

    #[tokio::test]
    async fn fetch_reads_and_deletes_one_request() {
        let list: Rule = mock!(aws_sdk_s3::Client::list_objects_v2)
            .match_requests(|req| req.bucket() == Some(TEST_BUCKET))
            .then_output(|| listing(&["requests/1"], Some("page-2")));
        let get: Rule = get_rule("requests/1", create_payload().to_string());
        let delete: Rule = delete_rule("requests/1");
        let mut source: S3BlobStore = S3BlobStore::new(
            mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&list, &get, &delete]),
            TEST_BUCKET,
        );

        let item: SourceItem = source
            .fetch_next()
            .await
            .expect("Fetch should succeed")
            .expect("A request should be returned");

        assert_eq!(create_request(), item.request);
        assert!(item.ack_token.is_none());
        assert_eq!(1, get.num_calls());
        assert_eq!(1, delete.num_calls());
    }

    fn widget_page() -> ListObjectsV2Output {
        listing(&["widgets/jane/1"], Some("more-widgets"))
    }

    fn from_start_rule(output: fn() -> ListObjectsV2Output) -> Rule {
        mock!(aws_sdk_s3::Client::list_objects_v2)
            .match_requests(|req| req.max_keys() == Some(1) && req.start_after().is_none())
            .sequence()
            .output(output)
            .repeatedly()
            .build()
    }

    fn past_widgets_rule(output: fn() -> ListObjectsV2Output) -> Rule {
        mock!(aws_sdk_s3::Client::list_objects_v2)
            .match_requests(|req| {
                req.max_keys() == Some(1)
                    && req
                        .start_after()
                        .is_some_and(|after| after > "widgets/zzzz" && after < "widgets0")
            })
            .sequence()
            .output(output)
            .repeatedly()
            .build()
    }

    #[tokio::test]
    async fn stored_widgets_are_not_requests() {
        let body: String = identity_payload("delete", "9", "Jane").to_string();

        let from_start: Rule = from_start_rule(widget_page);
        let past_widgets: Rule = past_widgets_rule(|| listing(&["x-requests/9"], None));
        let get: Rule = get_rule("x-requests/9", body);
        let delete: Rule = delete_rule("x-requests/9");
        let mut source: S3BlobStore = S3BlobStore::new(
            mock_client!(
                aws_sdk_s3,
                RuleMode::MatchAny,
                [&from_start, &past_widgets, &get, &delete]
            ),
            TEST_BUCKET,
        );

        let item: SourceItem = source
            .fetch_next()
            .await
            .expect("Fetch should succeed")
            .expect("A request should be returned");

        assert_eq!(RequestKind::Delete, item.request.kind);
        assert_eq!("9", item.request.widget_id);
        assert_eq!(1, from_start.num_calls());
        assert_eq!(1, past_widgets.num_calls());
    }

    #[tokio::test]
    async fn only_stored_widgets_yields_nothing() {
        let from_start: Rule = from_start_rule(widget_page);
        let past_widgets: Rule = past_widgets_rule(|| listing(&[], None));
        let mut source: S3BlobStore = S3BlobStore::new(
            mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&from_start, &past_widgets]),
            TEST_BUCKET,
        );

        assert!(source.fetch_next().await.expect("Fetch should succeed").is_none());
    }

    #[tokio::test]
    async fn idle_polls_list_a_fixed_number_of_times() {
        // Many pages of stored widgets are never paged through
        let from_start: Rule = from_start_rule(widget_page);
        let past_widgets: Rule = past_widgets_rule(|| listing(&[], None));
        let mut source: S3BlobStore = S3BlobStore::new(
            mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&from_start, &past_widgets]),
            TEST_BUCKET,
        );

        for _ in 0..5 {
            assert!(source.fetch_next().await.expect("Fetch should succeed").is_none());
        }

        assert_eq!(5, from_start.num_calls());
        assert_eq!(5, past_widgets.num_calls());
    }

    #[tokio::test]
    async fn malformed_request_is_lost_after_read() {
        let list: Rule = mock!(aws_sdk_s3::Client::list_objects_v2)
            .then_output(|| listing(&["requests/bad"], None));
        let get: Rule = get_rule("requests/bad", "{ not json".to_string());
        let delete: Rule = delete_rule("requests/bad");
        let mut source: S3BlobStore = S3BlobStore::new(
            mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&list, &get, &delete]),
            TEST_BUCKET,
        );

        let err: SourceError = source.fetch_next().await.expect_err("Fetch should fail");

        assert!(matches!(err, SourceError::BadRequest { .. }));
        assert_eq!(1, delete.num_calls());
    }
}
