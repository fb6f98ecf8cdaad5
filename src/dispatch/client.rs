//! Transport from the dispatcher to judge nodes

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::engine::server::COMPILE_AND_RUN_PATH;
use crate::error::TransportError;
use crate::protocol::{JudgeRequest, JudgeResponse};

/// Sends one judge request to one node
#[async_trait]
pub trait NodeClient: Send + Sync {
    async fn compile_and_run(
        &self,
        address: &str,
        req: &JudgeRequest,
    ) -> Result<JudgeResponse, TransportError>;
}

/// HTTP/JSON client for the node `POST /CompileAndRun` endpoint
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    client: reqwest::Client,
}

impl HttpNodeClient {
    pub fn new(connect_timeout: Duration, request_timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl NodeClient for HttpNodeClient {
    async fn compile_and_run(
        &self,
        address: &str,
        req: &JudgeRequest,
    ) -> Result<JudgeResponse, TransportError> {
        let url = format!("http://{}{}", address, COMPILE_AND_RUN_PATH);
        debug!("Forwarding judge request to {}", url);

        let response = self
            .client
            .post(&url)
            .json(req)
            .send()
            .await
            .map_err(|e| TransportError::Unreachable {
                address: address.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                address: address.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<JudgeResponse>()
            .await
            .map_err(|e| TransportError::Malformed {
                address: address.to_string(),
                message: e.to_string(),
            })
    }
}
