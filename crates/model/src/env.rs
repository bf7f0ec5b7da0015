/// Environment variable naming the bucket requests are drained from
pub const WIDGET_SOURCE_BUCKET: &str = "WIDGET_SOURCE_BUCKET";
/// Environment variable naming the queue requests are drained from
pub const WIDGET_SOURCE_QUEUE: &str = "WIDGET_SOURCE_QUEUE";
/// Environment variable naming the bucket widget documents are written to
pub const WIDGET_BLOB_BUCKET: &str = "WIDGET_BLOB_BUCKET";
/// Environment variable naming the DynamoDB table widget records are written to
pub const WIDGET_RECORD_TABLE: &str = "WIDGET_RECORD_TABLE";

/// Blob bucket used when draining a queue and no bucket is configured.
pub const DEFAULT_WIDGET_BUCKET: &str = "widget-blob-store";
