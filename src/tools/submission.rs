//! Answer submission to the quiz server.

use super::{SubmissionRequest, SubmissionResult, Submitter};
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, instrument};

pub struct HttpSubmitter {
    http: reqwest::Client,
}

impl HttpSubmitter {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Submitter for HttpSubmitter {
    #[instrument(skip(self, request), fields(submission_url = %request.submission_url))]
    async fn submit(&self, request: &SubmissionRequest) -> Result<SubmissionResult> {
        info!("Submitting answer {} for {}", request.answer, request.url);

        // Error statuses still carry a useful JSON body (e.g. a rejection reason).
        let response = self
            .http
            .post(&request.submission_url)
            .json(request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let result = SubmissionResult::from_body(&body);
        info!(
            "Submission answered {} (correct: {:?}, next: {:?})",
            status, result.correct, result.url
        );
        Ok(result)
    }
}
