//! S3-compatible object store

use super::ObjectStore;
use anyhow::{Context, Result};
use aws_sdk_s3 as s3;
use s3::config::{BehaviorVersion, Region};
use s3::primitives::ByteStream;
use std::path::Path;
use tokio::runtime::Runtime;
use tracing::debug;

/// Connection settings; unset values fall back to the AWS environment chain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Settings {
    pub region: Option<String>,
    /// Custom endpoint (MinIO, Spaces, ...); enables path-style addressing
    pub endpoint_url: Option<String>,
}

/// Blocking S3 uploader backed by a private runtime
pub struct S3ObjectStore {
    client: s3::Client,
    runtime: Runtime,
}

impl S3ObjectStore {
    pub fn new(settings: &S3Settings) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create runtime for S3 client")?;

        let sdk_config = runtime.block_on(async {
            let mut loader = aws_config::defaults(BehaviorVersion::latest());
            if let Some(ref region) = settings.region {
                loader = loader.region(Region::new(region.clone()));
            }
            if let Some(ref endpoint) = settings.endpoint_url {
                loader = loader.endpoint_url(endpoint);
            }
            loader.load().await
        });

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(settings.endpoint_url.is_some())
            .build();

        Ok(Self {
            client: s3::Client::from_conf(s3_config),
            runtime,
        })
    }
}

impl ObjectStore for S3ObjectStore {
    fn put_object(&self, bucket: &str, key: &str, file_path: &Path) -> Result<()> {
        self.runtime.block_on(async {
            let body = ByteStream::from_path(file_path)
                .await
                .with_context(|| format!("Failed to read {}", file_path.display()))?;

            self.client
                .put_object()
                .bucket(bucket)
                .key(key)
                .body(body)
                .send()
                .await
                .with_context(|| format!("PutObject s3://{}/{} failed", bucket, key))?;

            debug!("Uploaded {} to s3://{}/{}", file_path.display(), bucket, key);
            Ok::<(), anyhow::Error>(())
        })
    }
}
