pub mod core;

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::header::{CONTENT_TYPE, USER_AGENT};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;

use crate::core::config::{load_config, ConfigError, FeedRegistry};
use crate::core::feed::fetcher::{fetch_all, FetchError};
use crate::core::feed::serializer::{render_feed, FeedRenderError};
use crate::core::feed::types::FetchedDocument;
use crate::core::pipeline::{merge_and_filter, PipelineError};
use crate::core::report::{render_index, render_stats, ReportError};
use crate::core::stats::{LedgerSnapshot, StatisticsLedger};

const DEFAULT_FEED_CONTENT_TYPE: &str = "application/rss+xml";

/// Merge several RSS feeds, filter their entries and serve the result.
#[derive(Debug, Clone, Parser)]
#[command(name = "feedsieve", version, about)]
pub struct ServeOptions {
    /// Path to the YAML feed configuration
    #[arg(short = 'f', long, env = "FEEDSIEVE_CONFIG")]
    pub config: PathBuf,
    /// Host to listen on
    #[arg(short = 'l', long, default_value = "127.0.0.1")]
    pub host: String,
    /// Port to listen on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,
    /// Seconds to wait for each upstream feed
    #[arg(long, env = "FEEDSIEVE_FETCH_TIMEOUT", default_value_t = 20)]
    pub fetch_timeout: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum FeedRequestError {
    #[error("feed {0:?} is not configured")]
    NotFound(String),
    #[error("feed unavailable: {0}")]
    Fetch(#[from] FetchError),
    #[error("feed unavailable: {0}")]
    Pipeline(#[from] PipelineError),
    #[error("failed to render feed: {0}")]
    Render(#[from] FeedRenderError),
}

impl FeedRequestError {
    fn status(&self) -> StatusCode {
        match self {
            FeedRequestError::NotFound(_) => StatusCode::NOT_FOUND,
            FeedRequestError::Fetch(_) | FeedRequestError::Pipeline(_) => StatusCode::BAD_GATEWAY,
            FeedRequestError::Render(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for FeedRequestError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::warn!(error = %self, "feed request failed");
        }
        (status, self.to_string()).into_response()
    }
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "page render failed");
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
    }
}

#[derive(Clone)]
pub struct SharedState {
    feeds: Arc<FeedRegistry>,
    ledger: Arc<StatisticsLedger>,
    client: reqwest::Client,
    fetch_timeout: Duration,
}

impl SharedState {
    pub fn new(
        feeds: FeedRegistry,
        ledger: Arc<StatisticsLedger>,
        client: reqwest::Client,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            feeds: Arc::new(feeds),
            ledger,
            client,
            fetch_timeout,
        }
    }
}

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/stats", get(stats_page))
        .route("/stats.json", get(stats_json))
        .route("/health", get(app_health))
        .route("/{file}", get(serve_feed))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<SharedState>) -> Result<Html<String>, ReportError> {
    render_index(&state.feeds).map(Html)
}

async fn stats_page(State(state): State<SharedState>) -> Result<Html<String>, ReportError> {
    render_stats(&state.ledger.snapshot()).map(Html)
}

async fn stats_json(State(state): State<SharedState>) -> Json<LedgerSnapshot> {
    Json(state.ledger.snapshot())
}

async fn app_health(State(state): State<SharedState>) -> Json<BTreeMap<String, String>> {
    let mut report = BTreeMap::new();
    report.insert("status".to_string(), "ready".to_string());
    report.insert("feeds".to_string(), state.feeds.len().to_string());
    report.insert("passed".to_string(), state.ledger.len_passed().to_string());
    report.insert("blocked".to_string(), state.ledger.len_blocked().to_string());
    Json(report)
}

async fn serve_feed(
    State(state): State<SharedState>,
    Path(file): Path<String>,
    headers: HeaderMap,
) -> Result<Response, FeedRequestError> {
    let feed = file
        .strip_suffix(".rss")
        .and_then(|name| state.feeds.get(name))
        .ok_or_else(|| FeedRequestError::NotFound(file.clone()))?;
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|value| value.to_str().ok());

    let documents = fetch_all(&state.client, &feed.urls, user_agent, state.fetch_timeout).await?;
    let content_type = documents
        .first()
        .and_then(FetchedDocument::mime_type)
        .unwrap_or(DEFAULT_FEED_CONTENT_TYPE)
        .to_string();

    let entries = merge_and_filter(feed, &documents, &state.ledger)?;
    let body = render_feed(&feed.name, &entries)?;

    Ok(([(CONTENT_TYPE, content_type)], body).into_response())
}

pub async fn run(options: ServeOptions) -> Result<(), StartupError> {
    let feeds = load_config(&options.config)?;
    let fetch_timeout = Duration::from_secs(options.fetch_timeout);
    let client = reqwest::Client::builder()
        .timeout(fetch_timeout)
        .build()?;
    let state = SharedState::new(
        feeds,
        Arc::new(StatisticsLedger::new()),
        client,
        fetch_timeout,
    );

    let addr = format!("{}:{}", options.host, options.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|source| StartupError::Bind {
            addr: addr.clone(),
            source,
        })?;
    let local_addr: Option<SocketAddr> = listener.local_addr().ok();
    tracing::info!(addr = ?local_addr, "feedsieve listening");

    axum::serve(listener, router(state))
        .await
        .map_err(StartupError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::parse_config;
    use crate::core::feed::parser::parse_feed;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const UPSTREAM_A: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
  <item><title>Important Update</title><guid>g1</guid>
    <link>https://a.example/1?utm_source=feed</link><description>a</description>
    <pubDate>Tue, 24 Feb 2026 10:00:00 GMT</pubDate><dc:creator>spambot</dc:creator></item>
  <item><title>Buy pills</title><guid>g2</guid><link>https://a.example/2</link>
    <description>b</description><pubDate>Tue, 24 Feb 2026 11:00:00 GMT</pubDate>
    <category>Ads</category><dc:creator>spambot</dc:creator></item>
</channel></rss>"#;

    const UPSTREAM_B: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/"><channel>
  <item><title>Important Update</title><guid>g1</guid>
    <link>https://b.example/1</link><description>a</description>
    <pubDate>Tue, 24 Feb 2026 10:00:00 GMT</pubDate><dc:creator>spambot</dc:creator></item>
  <item><title>Release notes</title><guid>g3</guid><link>https://b.example/3</link>
    <description>c</description><pubDate>Tue, 24 Feb 2026 12:00:00 GMT</pubDate>
    <dc:creator>editor</dc:creator></item>
</channel></rss>"#;

    async fn spawn_upstream() -> (String, tokio::task::JoinHandle<()>) {
        let app = Router::new()
            .route(
                "/a.xml",
                get(|| async { ([(CONTENT_TYPE, "application/xml; charset=utf-8")], UPSTREAM_A) }),
            )
            .route(
                "/b.xml",
                get(|| async { ([(CONTENT_TYPE, "text/xml")], UPSTREAM_B) }),
            )
            .route(
                "/down.xml",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let address = listener.local_addr().expect("local addr should exist");
        let join_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server should run");
        });
        (format!("http://{address}"), join_handle)
    }

    fn test_state(base: &str) -> (SharedState, Arc<StatisticsLedger>) {
        let yaml = format!(
            r#"
feeds:
  - name: tech
    urls: ["{base}/a.xml", "{base}/b.xml"]
    exclude:
      - creator: "spam.*"
    include:
      - title: "Important.*"
  - name: broken
    urls: ["{base}/a.xml", "{base}/down.xml"]
"#
        );
        let feeds = parse_config(&yaml).expect("config must parse");
        let ledger = Arc::new(StatisticsLedger::new());
        let state = SharedState::new(
            feeds,
            Arc::clone(&ledger),
            reqwest::Client::new(),
            Duration::from_secs(5),
        );
        (state, ledger)
    }

    async fn get_path(app: Router, uri: &str) -> (StatusCode, HeaderMap, String) {
        let response = app
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header(USER_AGENT, "feed-reader/2.0")
                    .body(Body::empty())
                    .expect("request must build"),
            )
            .await
            .expect("router must answer");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body must be readable");
        (
            status,
            headers,
            String::from_utf8(bytes.to_vec()).expect("body must be utf-8"),
        )
    }

    #[tokio::test]
    async fn merged_feed_is_filtered_and_recorded() {
        let (base, upstream) = spawn_upstream().await;
        let (state, ledger) = test_state(&base);

        let (status, headers, body) = get_path(router(state), "/tech.rss").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()),
            Some("application/xml")
        );

        let entries = parse_feed(&body).expect("served feed must parse");
        let titles: Vec<&str> = entries.iter().map(|entry| entry.title.as_str()).collect();
        assert_eq!(titles, vec!["Important Update", "Release notes"]);
        assert_eq!(entries[0].link, "https://a.example/1");

        assert_eq!(ledger.classification("Important Update"), Some(true));
        assert_eq!(ledger.classification("Buy pills"), Some(false));
        assert_eq!(ledger.classification("Release notes"), Some(true));

        upstream.abort();
    }

    #[tokio::test]
    async fn unknown_feed_is_not_found() {
        let (state, _) = test_state("http://127.0.0.1:9");
        let app = router(state);

        let (status, _, _) = get_path(app.clone(), "/missing.rss").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _, _) = get_path(app, "/tech.xml").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn failing_source_fails_the_whole_request() {
        let (base, upstream) = spawn_upstream().await;
        let (state, ledger) = test_state(&base);

        let (status, _, body) = get_path(router(state), "/broken.rss").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body.contains("500"));
        assert_eq!((ledger.len_passed(), ledger.len_blocked()), (0, 0));

        upstream.abort();
    }

    #[tokio::test]
    async fn stats_views_reflect_ledger() {
        let (base, upstream) = spawn_upstream().await;
        let (state, _) = test_state(&base);
        let app = router(state);

        get_path(app.clone(), "/tech.rss").await;

        let (status, _, html) = get_path(app.clone(), "/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert!(html.contains("Buy pills"));

        let (_, _, json) = get_path(app.clone(), "/stats.json").await;
        let snapshot: serde_json::Value = serde_json::from_str(&json).expect("stats must be json");
        assert_eq!(snapshot["blocked"][0]["title"], "Buy pills");
        assert_eq!(snapshot["blocked_categories"][0]["label"], "Ads");
        assert_eq!(snapshot["passed_creators"].as_array().map(Vec::len), Some(2));

        let (_, _, health) = get_path(app.clone(), "/health").await;
        let health: BTreeMap<String, String> =
            serde_json::from_str(&health).expect("health must be json");
        assert_eq!(health.get("passed").map(String::as_str), Some("2"));
        assert_eq!(health.get("feeds").map(String::as_str), Some("2"));

        let (_, _, index) = get_path(app, "/").await;
        assert!(index.contains("tech.rss"));

        upstream.abort();
    }
}
