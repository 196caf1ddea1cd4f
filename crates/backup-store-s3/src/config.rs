use aws_config::Region;
use aws_sdk_s3::config::{BehaviorVersion, Credentials};
use aws_sdk_s3::Client as S3Client;
use clap::Args;

/// Connection settings for an S3-compatible object store.
#[derive(Args, Debug, Clone)]
pub struct S3Config {
    /// S3-compatible endpoint URL (e.g. http://storage-service:9000)
    #[arg(long = "store-endpoint", env = "MINIO_ENDPOINT")]
    pub endpoint: String,

    /// Access key ID
    #[arg(long = "store-access-key", env = "MINIO_ACCESS_KEY", default_value = "minioadmin")]
    pub access_key: String,

    /// Secret access key
    #[arg(
        long = "store-secret-key",
        env = "MINIO_SECRET_KEY",
        default_value = "minioadmin",
        hide_env_values = true
    )]
    pub secret_key: String,

    /// Bucket holding the versioned backups
    #[arg(long, env = "MINIO_BUCKET", default_value = "ceph-backup-bucket")]
    pub bucket: String,

    /// Signing region (MinIO and Ceph accept any value)
    #[arg(long = "store-region", env = "MINIO_REGION", default_value = "us-east-1")]
    pub region: String,

    /// Retries for transient store errors (429 / 5xx / timeouts) per request
    #[arg(long = "store-max-retries", env = "STORE_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,
}

impl S3Config {
    /// Build an S3 client with static credentials and path-style addressing.
    pub fn build_client(&self) -> S3Client {
        let credentials = Credentials::new(
            &self.access_key,
            &self.secret_key,
            None,
            None,
            "backup-store-s3",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(self.region.clone()))
            .endpoint_url(self.endpoint.clone())
            .force_path_style(true)
            .build();

        S3Client::from_conf(s3_config)
    }
}
