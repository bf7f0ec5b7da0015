use clap::{ArgGroup, Parser};
use model::Error;
use model::env::{
    DEFAULT_WIDGET_BUCKET, WIDGET_BLOB_BUCKET, WIDGET_RECORD_TABLE, WIDGET_SOURCE_BUCKET,
    WIDGET_SOURCE_QUEUE,
};
use std::time::Duration;

/// Drains widget change requests and mirrors them into S3 and DynamoDB.
#[derive(Debug, Parser)]
#[command(name = "widget_sync", version)]
#[command(group(ArgGroup::new("source").required(true).args(["bucket", "queue"])))]
pub struct Config {
    /// Bucket to read requests from; also receives widget documents by default
    #[arg(long, env = WIDGET_SOURCE_BUCKET)]
    pub bucket: Option<String>,

    /// Name of the SQS queue to read requests from
    #[arg(long, env = WIDGET_SOURCE_QUEUE)]
    pub queue: Option<String>,

    /// DynamoDB table receiving widget records
    #[arg(long, env = WIDGET_RECORD_TABLE)]
    pub table: String,

    /// Bucket receiving widget documents
    #[arg(long, env = WIDGET_BLOB_BUCKET)]
    pub widget_bucket: Option<String>,

    /// Idle wait between polls of an empty source
    #[arg(long, default_value_t = 100)]
    pub poll_interval_ms: u64,

    /// Long-poll wait for each SQS receive
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(i32).range(0..=20))]
    pub wait_time_seconds: i32,
}

/// Where requests are drained from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    Bucket(String),
    Queue(String),
}

impl Config {
    pub fn source(&self) -> Result<Source, Error> {
        match (&self.bucket, &self.queue) {
            (Some(bucket), None) => Ok(Source::Bucket(bucket.clone())),
            (None, Some(queue)) => Ok(Source::Queue(queue.clone())),
            _ => Err("exactly one of a source bucket or a source queue is required".into()),
        }
    }

    /// Explicit widget bucket, else the source bucket, else the fixed default.
    pub fn widget_bucket(&self) -> String {
        self.widget_bucket
            .clone()
            .or_else(|| self.bucket.clone())
            .unwrap_or_else(|| DEFAULT_WIDGET_BUCKET.to_string())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
