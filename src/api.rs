use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{BackendStatus, ChatReply, ChunkCount, FileEntry, IngestReport, Mode};

/// The backend call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Browse,
    Ingest,
    Chat,
    Status,
}

impl Operation {
    fn failure(&self) -> &'static str {
        match self {
            Operation::Browse => "listing failed",
            Operation::Ingest => "ingestion failed",
            Operation::Chat => "chat failed",
            Operation::Status => "status check failed",
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{}: could not reach the backend ({source})", .op.failure())]
    Network {
        op: Operation,
        #[source]
        source: reqwest::Error,
    },
    #[error("{}: backend answered {status}", .op.failure())]
    Status { op: Operation, status: StatusCode },
    #[error("{}: unexpected response body ({source})", .op.failure())]
    Decode {
        op: Operation,
        #[source]
        source: reqwest::Error,
    },
}

impl ApiError {
    pub fn operation(&self) -> Operation {
        match self {
            ApiError::Network { op, .. } | ApiError::Status { op, .. } | ApiError::Decode { op, .. } => *op,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Serialize)]
struct PathRequest<'a> {
    path: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    question: &'a str,
    mode: Mode,
}

#[derive(Deserialize)]
struct IngestResponse {
    chunks_created: Option<u64>,
    details: Option<Vec<serde_json::Value>>,
}

impl IngestResponse {
    fn chunk_count(&self) -> ChunkCount {
        match (self.chunks_created, self.details.as_ref()) {
            (Some(n), _) if n > 0 => ChunkCount::Known(n),
            (_, Some(details)) if !details.is_empty() => ChunkCount::Known(details.len() as u64),
            _ => ChunkCount::Unknown,
        }
    }
}

/// Client for the RAG backend. Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct RagClient {
    client: Client,
    base_url: String,
}

impl RagClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn browse(&self, path: &str) -> ApiResult<Vec<FileEntry>> {
        self.post(Operation::Browse, "/api/browse", &PathRequest { path })
            .await
    }

    pub async fn ingest(&self, path: &str) -> ApiResult<IngestReport> {
        let response: IngestResponse = self
            .post(Operation::Ingest, "/api/ingest", &PathRequest { path })
            .await?;
        Ok(IngestReport {
            count: response.chunk_count(),
        })
    }

    pub async fn chat(&self, question: &str, mode: Mode) -> ApiResult<ChatReply> {
        self.post(Operation::Chat, "/api/chat", &ChatRequest { question, mode })
            .await
    }

    pub async fn status(&self) -> ApiResult<BackendStatus> {
        let op = Operation::Status;
        let url = format!("{}/", self.base_url);
        tracing::debug!(%url, "GET");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|source| ApiError::Network { op, source })?;
        Self::decode(op, response).await
    }

    async fn post<B, T>(&self, op: Operation, endpoint: &str, body: &B) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: for<'de> Deserialize<'de>,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!(%url, ?op, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|source| ApiError::Network { op, source })?;
        Self::decode(op, response).await
    }

    async fn decode<T>(op: Operation, response: reqwest::Response) -> ApiResult<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(?op, %status, "backend returned an error status");
            return Err(ApiError::Status { op, status });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| ApiError::Decode { op, source })
    }
}
