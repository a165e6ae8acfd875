use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::domain::CompletionEvent;
use crate::error::EngineError;

/// Supplies the bearer credential for submissions; token lifecycle lives elsewhere
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> Option<String>;
}

/// Fixed token (or none), e.g. from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl TokenSource for StaticToken {
    async fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Delivers a whole batch of completion events in one request
#[async_trait]
pub trait CompletionSubmitter: Send + Sync {
    async fn submit(&self, endpoint: &str, batch: &[CompletionEvent]) -> Result<(), EngineError>;
}

#[derive(Serialize)]
struct CompletionBatch<'a> {
    completions: &'a [CompletionEvent],
}

/// POSTs `{"completions": [...]}` as JSON; any 2xx counts as delivered
pub struct HttpSubmitter {
    client: Client,
    tokens: Arc<dyn TokenSource>,
}

impl HttpSubmitter {
    /// No request timeout is set; the transport defaults apply
    pub fn new(tokens: Arc<dyn TokenSource>) -> Result<Self, EngineError> {
        let client = Client::builder()
            .user_agent(concat!("practice-engine/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, tokens })
    }
}

#[async_trait]
impl CompletionSubmitter for HttpSubmitter {
    async fn submit(&self, endpoint: &str, batch: &[CompletionEvent]) -> Result<(), EngineError> {
        let mut request = self
            .client
            .post(endpoint)
            .json(&CompletionBatch { completions: batch });

        if let Some(token) = self.tokens.bearer_token().await {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(EngineError::Network(format!(
                "aggregator returned {}: {}",
                status.as_u16(),
                body.chars().take(200).collect::<String>()
            )))
        }
    }
}
