use crate::config::{Config, Source};
use aws_config::{BehaviorVersion, SdkConfig};
use clap::Parser;
use model::Error;
use source::SourceReader;
use source_sqs::SqsSourceReader;
use std::sync::Arc;
use store_dynamodb::DynamoDbRecordStore;
use store_s3::S3BlobStore;
use synchronizer::Synchronizer;
use tracing_subscriber::EnvFilter;

mod config;

fn init_tracing() {
    let filter: EnvFilter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn source_reader(
    config: &Config,
    sdk_config: &SdkConfig,
) -> Result<Box<dyn SourceReader>, Error> {
    match config.source()? {
        Source::Bucket(bucket) => Ok(Box::new(S3BlobStore::new(
            aws_sdk_s3::Client::new(sdk_config),
            bucket,
        ))),
        Source::Queue(queue) => {
            let reader: SqsSourceReader = SqsSourceReader::connect(
                aws_sdk_sqs::Client::new(sdk_config),
                &queue,
                config.wait_time_seconds,
            )
            .await?;

            Ok(Box::new(reader))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    init_tracing();

    let config: Config = Config::parse();
    tracing::info!("Starting widget sync with {config:?}");

    let sdk_config: SdkConfig = aws_config::load_defaults(BehaviorVersion::latest()).await;

    let blob_store: S3BlobStore =
        S3BlobStore::new(aws_sdk_s3::Client::new(&sdk_config), config.widget_bucket());
    let record_store: DynamoDbRecordStore =
        DynamoDbRecordStore::new(aws_sdk_dynamodb::Client::new(&sdk_config), &config.table);

    let mut synchronizer: Synchronizer = Synchronizer::new(
        Arc::new(blob_store),
        Arc::new(record_store),
        source_reader(&config, &sdk_config).await?,
    )
    .with_poll_interval(config.poll_interval());

    synchronizer.run().await
}
