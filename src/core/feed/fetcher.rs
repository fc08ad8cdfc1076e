use std::time::Duration;

use futures::future::try_join_all;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};

use super::types::FetchedDocument;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with unexpected status code {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("{url} did not answer within {timeout:?}")]
    Timeout { url: String, timeout: Duration },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Request { url, .. }
            | FetchError::HttpStatus { url, .. }
            | FetchError::Timeout { url, .. } => url,
        }
    }
}

/// Fetches one source. The timeout bounds the whole exchange, body included.
pub async fn fetch_source(
    client: &reqwest::Client,
    url: &str,
    user_agent: Option<&str>,
    timeout: Duration,
) -> Result<FetchedDocument, FetchError> {
    match tokio::time::timeout(timeout, fetch_source_unbounded(client, url, user_agent)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            url: url.to_string(),
            timeout,
        }),
    }
}

pub async fn fetch_all(
    client: &reqwest::Client,
    urls: &[String],
    user_agent: Option<&str>,
    timeout: Duration,
) -> Result<Vec<FetchedDocument>, FetchError> {
    try_join_all(
        urls.iter()
            .map(|url| fetch_source(client, url, user_agent, timeout)),
    )
    .await
}

async fn fetch_source_unbounded(
    client: &reqwest::Client,
    url: &str,
    user_agent: Option<&str>,
) -> Result<FetchedDocument, FetchError> {
    let request_error = |source| FetchError::Request {
        url: url.to_string(),
        source,
    };

    let mut request = client.get(url);
    if let Some(value) = user_agent {
        request = request.header(USER_AGENT, value);
    }

    let response = request.send().await.map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string);
    let body = response.bytes().await.map_err(request_error)?.to_vec();
    tracing::debug!(url, bytes = body.len(), "fetched upstream feed");

    Ok(FetchedDocument {
        url: url.to_string(),
        body,
        content_type,
    })
}
