//! Offline caching proxy.
//!
//! The proxy is the application's only road to the network. It runs as
//! its own tokio task, independent of any session, and the rest of the
//! crate talks to it exclusively through a [`ProxyHandle`]: fetches go
//! over a request channel with one-shot replies, and the skip-wait
//! command goes over the same channel as a control message. No state is
//! shared between the proxy and its callers.
//!
//! Every GET request is classified into one of three policies:
//!
//! - **Shell** (navigation documents): cache-first against the shell
//!   partition, falling back to the cached root document when the
//!   network is down, so the application shell always loads.
//! - **Asset** (images, fonts, styles, scripts, `/assets/`):
//!   cache-first against the runtime partition.
//! - **Dynamic** (API calls and everything else): network-first with an
//!   opportunistic runtime-partition fallback.
//!
//! Non-GET and non-http requests bypass caching entirely. The proxy is
//! also the system's sole connectivity authority: it publishes its last
//! observed network outcome on a watch channel that the session engine
//! reads.

mod cache;
mod classify;
mod worker;

pub use classify::RequestClass;

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::sync::{mpsc, oneshot, watch};

use crate::config::{ProxyConfig, RequestConfig};
use crate::error::{ProxyError, ProxyResult};
use worker::{ProxyMessage, ProxyWorker};

/// What kind of resource a request is for.
///
/// The browser's fetch metadata collapsed into the cases the caching
/// policies care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Destination {
    /// A navigation request for an HTML document.
    Document,
    /// An image resource.
    Image,
    /// A font resource.
    Font,
    /// A stylesheet.
    Style,
    /// A script.
    Script,
    /// Anything else, including API calls.
    #[default]
    Other,
}

/// A request submitted to the proxy for interception.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    /// HTTP method.
    pub method: Method,
    /// Absolute request URL.
    pub url: String,
    /// Resource kind, used for policy classification.
    pub destination: Destination,
    /// JSON request body, if any.
    pub body: Option<Vec<u8>>,
}

/// A response snapshot returned by the proxy.
///
/// This is also the shape stored in cache partitions, so a cached reply
/// is byte-identical to the network reply it snapshotted.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    /// HTTP status code.
    pub status: u16,
    /// Content-Type header, if present.
    pub content_type: Option<String>,
    /// Raw response body.
    pub body: Vec<u8>,
}

impl ProxyRequest {
    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            destination: Destination::Other,
            body: None,
        }
    }

    /// Create a POST request with a pre-encoded JSON body.
    pub fn post_bytes(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: Method::POST,
            url: url.into(),
            destination: Destination::Other,
            body: Some(body),
        }
    }

    /// Set the resource destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }
}

impl ProxyResponse {
    /// Whether the status code is in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Deserialize the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> ProxyResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| ProxyError::Network {
            message: format!("Failed to parse response body: {}", e),
        })
    }
}

/// Client-side handle to the running proxy task.
///
/// Cheap to clone; every clone talks to the same proxy.
#[derive(Debug, Clone)]
pub struct ProxyHandle {
    tx: mpsc::Sender<ProxyMessage>,
    connectivity: watch::Receiver<bool>,
}

impl ProxyHandle {
    /// Submit a request for interception and await the response.
    pub async fn fetch(&self, request: ProxyRequest) -> ProxyResult<ProxyResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ProxyMessage::Fetch {
                request,
                reply: reply_tx,
            })
            .await
            .map_err(|_| ProxyError::NotRunning)?;

        reply_rx.await.map_err(|_| ProxyError::NotRunning)?
    }

    /// Tell a waiting proxy to activate immediately instead of waiting
    /// for an explicit activation.
    pub async fn skip_waiting(&self) -> ProxyResult<()> {
        self.tx
            .send(ProxyMessage::SkipWaiting)
            .await
            .map_err(|_| ProxyError::NotRunning)
    }

    /// Watch channel carrying the proxy's online/offline signal.
    pub fn connectivity(&self) -> watch::Receiver<bool> {
        self.connectivity.clone()
    }

    /// Last observed connectivity state.
    pub fn is_online(&self) -> bool {
        *self.connectivity.borrow()
    }
}

/// The caching proxy process.
pub struct CachingProxy;

impl CachingProxy {
    /// Spawn the proxy task.
    ///
    /// Installs immediately (seeding the shell partition from the
    /// manifest under `origin`), then either activates right away when
    /// `config.skip_waiting` is set or waits for the skip-wait control
    /// message; while waiting every request passes through uncached.
    pub fn spawn(
        config: ProxyConfig,
        request_config: &RequestConfig,
        origin: impl Into<String>,
    ) -> ProxyResult<ProxyHandle> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ProxyError::Http)?;

        let (tx, rx) = mpsc::channel(64);
        let (online_tx, online_rx) = watch::channel(true);

        let worker = ProxyWorker::new(
            config,
            origin.into(),
            client,
            request_config.timeout_ms,
            online_tx,
        );
        tokio::spawn(worker.run(rx));

        Ok(ProxyHandle {
            tx,
            connectivity: online_rx,
        })
    }
}
