use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::proposal::{
    GenerateRequest, ImagesRequest, ImagesResponse, ProposalPayload, SearchRequest,
    SearchResponse,
};

pub const SEARCH_PATH: &str = "/api/search";
pub const IMAGES_PATH: &str = "/api/images";
pub const GENERATE_PATH: &str = "/api/generate";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned status {status}")]
    Status {
        endpoint: &'static str,
        status: StatusCode,
    },
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: &'static str,
        #[source]
        source: reqwest::Error,
    },
}

/// Search, image and generation endpoints the builder depends on.
pub trait ProposalBackend: Send + Sync + 'static {
    fn search_context(
        &self,
        request: SearchRequest,
    ) -> impl Future<Output = Result<SearchResponse, BackendError>> + Send;

    fn search_images(
        &self,
        request: ImagesRequest,
    ) -> impl Future<Output = Result<ImagesResponse, BackendError>> + Send;

    fn generate(
        &self,
        request: GenerateRequest,
    ) -> impl Future<Output = Result<ProposalPayload, BackendError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post_json<Req, Resp>(
        &self,
        endpoint: &'static str,
        body: &Req,
    ) -> Result<Resp, BackendError>
    where
        Req: Serialize + ?Sized,
        Resp: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .json(body)
            .send()
            .await
            .map_err(|source| BackendError::Transport { endpoint, source })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status { endpoint, status });
        }

        response
            .json::<Resp>()
            .await
            .map_err(|source| BackendError::Decode { endpoint, source })
    }
}

impl ProposalBackend for HttpBackend {
    async fn search_context(&self, request: SearchRequest) -> Result<SearchResponse, BackendError> {
        self.post_json(SEARCH_PATH, &request).await
    }

    async fn search_images(&self, request: ImagesRequest) -> Result<ImagesResponse, BackendError> {
        self.post_json(IMAGES_PATH, &request).await
    }

    async fn generate(&self, request: GenerateRequest) -> Result<ProposalPayload, BackendError> {
        self.post_json(GENERATE_PATH, &request).await
    }
}
