//! # KYC AWS
//!
//! AWS implementations of the `kyc-core` store traits:
//! - [`DynamoCaseStore`]: case records in DynamoDB
//! - [`S3ObjectStore`]: screening reports in S3
//! - [`SsmParameterStore`]: API keys in SSM Parameter Store
//!
//! Credentials and region come from the standard AWS provider chain.

#![warn(rust_2018_idioms)]

pub mod attribute;
pub mod dynamo;
pub mod s3;
pub mod ssm;

pub use dynamo::{DynamoCaseStore, MergeStep, MAX_MERGE_ATTEMPTS};
pub use s3::S3ObjectStore;
pub use ssm::SsmParameterStore;

use kyc_core::CoreConfig;

/// The three AWS-backed stores, built from one shared SDK configuration.
#[derive(Debug, Clone)]
pub struct AwsStores {
    pub cases: DynamoCaseStore,
    pub objects: S3ObjectStore,
    pub parameters: SsmParameterStore,
}

impl AwsStores {
    /// Loads the default AWS configuration and builds clients for the tables and buckets named
    /// in `cfg`.
    pub async fn from_env(cfg: &CoreConfig) -> Self {
        let sdk = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        tracing::info!(
            region = ?sdk.region(),
            table = cfg.cases_table(),
            bucket = cfg.results_bucket(),
            "AWS stores configured"
        );

        Self {
            cases: DynamoCaseStore::new(aws_sdk_dynamodb::Client::new(&sdk), cfg.cases_table()),
            objects: S3ObjectStore::new(aws_sdk_s3::Client::new(&sdk)),
            parameters: SsmParameterStore::new(aws_sdk_ssm::Client::new(&sdk)),
        }
    }
}
