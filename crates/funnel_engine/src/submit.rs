use std::time::Duration;

use serde_json::json;
use url::Url;

use crate::{LeadSubmissionRequest, SubmissionReceipt, SubmitError, SubmitFailureKind};

/// GraphQL document for the lead batch mutation.
const LEAD_BATCH_MUTATION: &str = "mutation LeadBatchCreate($input: LeadBatchCreateInput!) { \
     leadBatchCreate(input: $input) { batchId } }";

#[derive(Debug, Clone)]
pub struct SubmitSettings {
    pub endpoint: Url,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl SubmitSettings {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[async_trait::async_trait]
pub trait LeadSubmitter: Send + Sync {
    async fn submit_lead(
        &self,
        request: &LeadSubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmitError>;
}

#[derive(Debug, Clone)]
pub struct GraphqlLeadSubmitter {
    settings: SubmitSettings,
}

impl GraphqlLeadSubmitter {
    pub fn new(settings: SubmitSettings) -> Self {
        Self { settings }
    }

    fn build_client(&self) -> Result<reqwest::Client, SubmitError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| SubmitError::new(SubmitFailureKind::Network, err.to_string()))
    }
}

#[async_trait::async_trait]
impl LeadSubmitter for GraphqlLeadSubmitter {
    async fn submit_lead(
        &self,
        request: &LeadSubmissionRequest,
    ) -> Result<SubmissionReceipt, SubmitError> {
        let client = self.build_client()?;
        let body = json!({
            "query": LEAD_BATCH_MUTATION,
            "variables": { "input": request },
        });

        let response = client
            .post(self.settings.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::new(
                SubmitFailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|err| SubmitError::new(SubmitFailureKind::Protocol, err.to_string()))?;

        if let Some(errors) = payload.get("errors").and_then(|value| value.as_array()) {
            if !errors.is_empty() {
                let message = errors[0]
                    .get("message")
                    .and_then(|message| message.as_str())
                    .unwrap_or("unspecified graphql error");
                return Err(SubmitError::new(SubmitFailureKind::GraphQl, message));
            }
        }

        // An empty batch id means the mutation did not actually land.
        let batch_id = payload
            .pointer("/data/leadBatchCreate/batchId")
            .and_then(|value| value.as_str())
            .unwrap_or_default();
        if batch_id.is_empty() {
            return Err(SubmitError::new(
                SubmitFailureKind::MissingConfirmation,
                "response carried no batch id",
            ));
        }

        Ok(SubmissionReceipt {
            batch_id: batch_id.to_string(),
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SubmitError {
    if err.is_timeout() {
        return SubmitError::new(SubmitFailureKind::Timeout, err.to_string());
    }
    SubmitError::new(SubmitFailureKind::Network, err.to_string())
}
