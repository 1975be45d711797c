//! # Request Executor
//!
//! Performs one streaming chat-completion request per call and turns the
//! outcome, whatever it is, into a [`RequestResult`]. Failures are carried as
//! an explicit [`RequestError`] internally and never escape as errors or
//! panics, so the runner can keep going after any single request fails.

use std::io::Write;
use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use tokio::time::Instant;
use tracing::{info, trace, warn};

use crate::config::RunConfig;
use crate::core::http_client::{HttpClientBuilder, HttpClientError};
use crate::error::{error_chain, RequestError};
use crate::metrics::RequestResult;
use crate::schemas::ChatCompletionRequest;
use crate::streaming::{decode_stream, DecodedStream};

/// One request/response cycle against the probed endpoint.
///
/// Implementations must not fail: every problem is folded into the returned
/// result.
#[async_trait::async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, index: u32, total: u32) -> RequestResult;
}

/// # Request Executor
///
/// Streams a chat completion from the configured endpoint. The per-request
/// timeout lives on the HTTP client and covers connecting and reading the
/// whole body, so a stalled stream ends as a transport error.
#[derive(Clone, Debug)]
pub struct RequestExecutor {
    client: Client,
    config: Arc<RunConfig>,
    /// Print tokens to stdout as they arrive
    echo_tokens: bool,
}

impl RequestExecutor {
    /// Create an executor with a client built from the run configuration.
    pub fn new(config: Arc<RunConfig>) -> Result<Self, HttpClientError> {
        let client = HttpClientBuilder::from_config(&config).build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: Arc<RunConfig>) -> Self {
        Self {
            client,
            config,
            echo_tokens: true,
        }
    }

    pub fn echo_tokens(mut self, enabled: bool) -> Self {
        self.echo_tokens = enabled;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Request body sent on every probe.
    pub fn build_request(&self) -> ChatCompletionRequest {
        ChatCompletionRequest::probe(
            self.config.model.as_str(),
            self.config.prompt.as_str(),
            self.config.max_tokens,
            self.config.temperature,
        )
    }

    async fn stream_completion(&self) -> Result<DecodedStream, RequestError> {
        let response = self
            .client
            .post(&self.config.api_url)
            .bearer_auth(&self.config.api_key)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .json(&self.build_request())
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.bytes().await?;
            return Err(RequestError::Protocol {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }

        let echo = self.echo_tokens;
        let mut stdout = std::io::stdout();
        let decoded = decode_stream(Box::pin(response.bytes_stream()), |token: &str| {
            if echo {
                if let Err(err) = stdout.write_all(token.as_bytes()).and_then(|()| stdout.flush()) {
                    trace!(error = %err, "Token echo failed");
                }
            }
        })
        .await
        // Failing mid-body (reset, truncated chunk, deadline) is a transport problem.
        .map_err(|err| RequestError::Transport(error_chain(&err)))?;

        if echo && decoded.metrics.tokens > 0 {
            if let Err(err) = writeln!(stdout) {
                trace!(error = %err, "Token echo failed");
            }
        }
        Ok(decoded)
    }
}

#[async_trait::async_trait]
impl Probe for RequestExecutor {
    async fn probe(&self, index: u32, total: u32) -> RequestResult {
        info!(request = index, total, "===== Request {}/{} started =====", index, total);

        let started = Instant::now();
        let outcome = self.stream_completion().await;
        let elapsed = started.elapsed();

        match outcome {
            Ok(decoded) => {
                info!(
                    request = index,
                    chars = decoded.char_count(),
                    saw_done = decoded.metrics.saw_done,
                    "===== Request {}/{} finished in {:.3}s =====",
                    index,
                    total,
                    elapsed.as_secs_f64()
                );
                RequestResult::success(index, elapsed, decoded.char_count())
            }
            Err(err) => {
                warn!(
                    request = index,
                    error = %err,
                    "===== Request {}/{} failed in {:.3}s =====",
                    index,
                    total,
                    elapsed.as_secs_f64()
                );
                RequestResult::failure(index, elapsed, &err)
            }
        }
    }
}
