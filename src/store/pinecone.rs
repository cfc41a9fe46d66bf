//! Pinecone REST client.
//!
//! Index management goes through the control plane; upserts, statistics and queries go to
//! the index host, which is looked up once and cached.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;

use super::{IndexSpec, IndexStats, Metric, QueryMatch, VectorEntry, VectorStore};
use crate::config::PineconeConfig;
use crate::error::StoreError;

pub struct PineconeStore {
    client: reqwest::Client,
    control_url: String,
    index: String,
    host: OnceCell<String>,
    ready_attempts: usize,
    ready_interval: std::time::Duration,
}

impl PineconeStore {
    /// Builds a client bound to the index called `index`.
    pub fn new(config: &PineconeConfig, index: impl Into<String>) -> Result<Self, StoreError> {
        if config.api_key.trim().is_empty() {
            return Err(StoreError::config("missing Pinecone API key"));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            "api-key",
            HeaderValue::from_str(config.api_key.trim())
                .map_err(|_| StoreError::config("invalid Pinecone API key"))?,
        );
        headers.insert(
            "x-pinecone-api-version",
            HeaderValue::from_str(&config.api_version)
                .map_err(|_| StoreError::config("invalid Pinecone API version"))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            control_url: config.control_url.trim_end_matches('/').to_string(),
            index: index.into(),
            host: OnceCell::new(),
            ready_attempts: config.ready_attempts.max(1),
            ready_interval: config.ready_interval,
        })
    }

    async fn describe_index(&self) -> Result<IndexDescription, StoreError> {
        let url = format!("{}/indexes/{}", self.control_url, self.index);
        let response = self.client.get(url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(StoreError::index_not_found(&self.index));
        }
        read_json(response).await
    }

    async fn data_url(&self, path: &str) -> Result<String, StoreError> {
        let host = self
            .host
            .get_or_try_init(|| async {
                let description = self.describe_index().await?;
                tracing::debug!(index = %self.index, host = %description.host, "Resolved index host");
                Ok::<_, StoreError>(description.host)
            })
            .await?;
        Ok(data_plane_url(host, path))
    }

    async fn wait_until_ready(&self) -> Result<(), StoreError> {
        for attempt in 1..=self.ready_attempts {
            let description = self.describe_index().await?;
            if description.status.ready {
                tracing::info!(index = %self.index, "Index is ready");
                return Ok(());
            }
            tracing::debug!(
                index = %self.index,
                attempt,
                state = %description.status.state,
                "Waiting for index"
            );
            tokio::time::sleep(self.ready_interval).await;
        }
        Err(StoreError::NotReady(self.index.clone()))
    }
}

impl VectorStore for PineconeStore {
    async fn create_index(&self, spec: &IndexSpec) -> Result<(), StoreError> {
        let payload = CreateIndexRequest::from_spec(spec);
        let url = format!("{}/indexes", self.control_url);

        tracing::info!(
            index = %spec.name,
            dimension = spec.dimension,
            metric = ?spec.metric,
            "Creating index"
        );

        let response = self.client.post(url).json(&payload).send().await?;
        let status = response.status();
        if status == StatusCode::CONFLICT {
            tracing::info!(index = %spec.name, "Index already exists");
        } else if !status.is_success() {
            return Err(rejected(response).await);
        }

        self.wait_until_ready().await
    }

    async fn upsert(&self, entries: &[VectorEntry], namespace: &str) -> Result<usize, StoreError> {
        let url = self.data_url("vectors/upsert").await?;
        let payload = UpsertRequest {
            vectors: entries,
            namespace,
        };

        tracing::info!(
            index = %self.index,
            namespace = %namespace,
            "Upserting {} vectors",
            entries.len()
        );

        let response = self.client.post(url).json(&payload).send().await?;
        let body: UpsertResponse = read_json(response).await?;
        Ok(body.upserted_count)
    }

    async fn describe_stats(&self) -> Result<IndexStats, StoreError> {
        let url = self.data_url("describe_index_stats").await?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await?;
        read_json(response).await
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        namespace: &str,
    ) -> Result<Vec<QueryMatch>, StoreError> {
        let url = self.data_url("query").await?;
        let payload = QueryRequest {
            namespace,
            vector,
            top_k,
            include_metadata: true,
        };

        let response = self.client.post(url).json(&payload).send().await?;
        let body: QueryResponse = read_json(response).await?;
        Ok(body.matches)
    }
}

/// Index hosts come back without a scheme.
fn data_plane_url(host: &str, path: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        format!("{}/{}", host, path)
    } else {
        format!("https://{}/{}", host, path)
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, StoreError> {
    if !response.status().is_success() {
        return Err(rejected(response).await);
    }
    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| StoreError::malformed(e.to_string()))
}

async fn rejected(response: reqwest::Response) -> StoreError {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<body unavailable>".to_string());
    StoreError::Rejected { status, body }
}

#[derive(Debug, Serialize)]
struct CreateIndexRequest<'a> {
    name: &'a str,
    dimension: usize,
    metric: Metric,
    spec: ServerlessSpec<'a>,
}

impl<'a> CreateIndexRequest<'a> {
    fn from_spec(spec: &'a IndexSpec) -> Self {
        Self {
            name: &spec.name,
            dimension: spec.dimension,
            metric: spec.metric,
            spec: ServerlessSpec {
                serverless: ServerlessLocation {
                    cloud: &spec.cloud,
                    region: &spec.region,
                },
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ServerlessSpec<'a> {
    serverless: ServerlessLocation<'a>,
}

#[derive(Debug, Serialize)]
struct ServerlessLocation<'a> {
    cloud: &'a str,
    region: &'a str,
}

#[derive(Debug, Deserialize)]
struct IndexDescription {
    host: String,
    #[serde(default)]
    status: IndexStatus,
}

#[derive(Debug, Default, Deserialize)]
struct IndexStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: String,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorEntry],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    upserted_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    namespace: &'a str,
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<QueryMatch>,
}
