//! SSM Parameter Store access for API keys.

use async_trait::async_trait;
use aws_sdk_ssm::error::{DisplayErrorContext, SdkError};
use aws_sdk_ssm::Client;
use kyc_core::store::{ParameterStore, StoreError};

#[derive(Debug, Clone)]
pub struct SsmParameterStore {
    client: Client,
}

impl SsmParameterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<String, StoreError> {
        let output = match self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await
        {
            Ok(output) => output,
            Err(SdkError::ServiceError(e)) if e.err().is_parameter_not_found() => {
                return Err(StoreError::ParameterNotFound(name.to_string()))
            }
            Err(e) => return Err(StoreError::Parameter(format!("{}", DisplayErrorContext(&e)))),
        };

        output
            .parameter()
            .and_then(|p| p.value())
            .map(str::to_string)
            .ok_or_else(|| StoreError::ParameterNotFound(name.to_string()))
    }
}
