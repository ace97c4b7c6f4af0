use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio_stream::wrappers::LinesStream;
use tracing::warn;

use crate::config::Config;
use crate::types::{
    BlockEvent, PageRequest, ParamsResponse, PostAllResponse, PostResponse, SentPostAllResponse,
    SentPostResponse,
};

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("deserialization error: {0}")]
    Deserialization(#[from] serde_json::Error),
    #[error("stream error: {0}")]
    Stream(String),
    #[error("node rejected query: {0}")]
    Rejected(String),
}

pub type BlockStream = Pin<Box<dyn futures::Stream<Item = Result<BlockEvent, ClientError>> + Send>>;

/// Query surface of the blog module plus the new-block event source the
/// store replays subscriptions on.
#[async_trait]
pub trait BlogQueryClient: Send + Sync {
    async fn query_params(&self) -> Result<ParamsResponse, ClientError>;
    async fn query_post(&self, id: u64) -> Result<PostResponse, ClientError>;
    async fn query_post_all(&self, page: Option<&PageRequest>)
        -> Result<PostAllResponse, ClientError>;
    async fn query_sent_post(&self, id: u64) -> Result<SentPostResponse, ClientError>;
    async fn query_sent_post_all(
        &self,
        page: Option<&PageRequest>,
    ) -> Result<SentPostAllResponse, ClientError>;

    fn block_stream(&self) -> BlockStream;
}

/// REST (LCD) implementation over the node's HTTP endpoints.
pub struct HttpQueryClient {
    client: Client,
    config: Config,
}

impl HttpQueryClient {
    pub fn new(config: Config) -> Result<Self, ClientError> {
        let client = Client::new();
        Ok(Self { client, config })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        page: Option<&PageRequest>,
    ) -> Result<T, ClientError> {
        let url = format!("{}/planet/blog/{}", self.config.node_base_url, path);
        let mut request = self.client.get(&url);
        if let Some(page) = page {
            request = request.query(&page_query(page));
        }
        let resp = request.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(rejection(status, &body));
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// Node-side rejection. LCD error bodies look like
/// `{"code":5,"message":"not found","details":[]}`; fall back to the raw
/// body or status line when there is no message field.
fn rejection(status: reqwest::StatusCode, body: &str) -> ClientError {
    let message = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("status {status}")
            } else {
                body.trim().to_string()
            }
        });
    ClientError::Rejected(message)
}

fn page_query(page: &PageRequest) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(key) = &page.key {
        query.push(("pagination.key", key.clone()));
    }
    if page.offset > 0 {
        query.push(("pagination.offset", page.offset.to_string()));
    }
    if page.limit > 0 {
        query.push(("pagination.limit", page.limit.to_string()));
    }
    if page.count_total {
        query.push(("pagination.count_total", "true".to_string()));
    }
    if page.reverse {
        query.push(("pagination.reverse", "true".to_string()));
    }
    query
}

#[async_trait]
impl BlogQueryClient for HttpQueryClient {
    async fn query_params(&self) -> Result<ParamsResponse, ClientError> {
        self.get_json("params", None).await
    }

    async fn query_post(&self, id: u64) -> Result<PostResponse, ClientError> {
        self.get_json(&format!("post/{id}"), None).await
    }

    async fn query_post_all(
        &self,
        page: Option<&PageRequest>,
    ) -> Result<PostAllResponse, ClientError> {
        self.get_json("post", page).await
    }

    async fn query_sent_post(&self, id: u64) -> Result<SentPostResponse, ClientError> {
        self.get_json(&format!("sent_post/{id}"), None).await
    }

    async fn query_sent_post_all(
        &self,
        page: Option<&PageRequest>,
    ) -> Result<SentPostAllResponse, ClientError> {
        self.get_json("sent_post", page).await
    }

    fn block_stream(&self) -> BlockStream {
        block_event_stream(self.client.clone(), self.config.block_stream_url.clone())
    }
}

fn block_event_stream(client: Client, url: String) -> BlockStream {
    use tokio::io::AsyncBufReadExt;

    let stream = futures::stream::once(async move {
        let resp = client.get(&url).send().await.map_err(ClientError::Http)?;
        let byte_stream = resp.bytes_stream();

        let reader = tokio_util::io::StreamReader::new(
            byte_stream.map(|r| r.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))),
        );
        let lines = tokio::io::BufReader::new(reader).lines();
        Ok::<_, ClientError>(LinesStream::new(lines))
    })
    .filter_map(|res| async {
        match res {
            Ok(line_stream) => Some(line_stream),
            Err(e) => {
                warn!("failed to open block stream: {e}");
                None
            }
        }
    })
    .flatten()
    .filter_map(|line_result| async {
        match line_result {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(
                serde_json::from_str::<BlockEvent>(&line).map_err(ClientError::Deserialization),
            ),
            Err(e) => Some(Err(ClientError::Stream(e.to_string()))),
        }
    });

    Box::pin(stream)
}
