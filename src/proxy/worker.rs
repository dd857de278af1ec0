use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use super::cache::{cache_key, PartitionSet};
use super::classify::{classify, is_api_path, RequestClass};
use super::{ProxyRequest, ProxyResponse};
use crate::config::ProxyConfig;
use crate::error::{ProxyError, ProxyResult};

/// Messages accepted by the proxy task.
#[derive(Debug)]
pub(super) enum ProxyMessage {
    /// Intercept a request and reply with the policy outcome.
    Fetch {
        request: ProxyRequest,
        reply: oneshot::Sender<ProxyResult<ProxyResponse>>,
    },
    /// Activate immediately without waiting.
    SkipWaiting,
}

/// Lifecycle of the proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    /// Installed, not yet controlling requests; everything passes
    /// through uncached.
    Waiting,
    /// Controlling all requests with the caching policies.
    Active,
}

/// The proxy task state. Owned exclusively by the spawned task; callers
/// only ever see the handle.
pub(super) struct ProxyWorker {
    config: ProxyConfig,
    origin: String,
    client: reqwest::Client,
    timeout_ms: u64,
    partitions: PartitionSet,
    lifecycle: Lifecycle,
    online_tx: watch::Sender<bool>,
}

impl ProxyWorker {
    pub(super) fn new(
        config: ProxyConfig,
        origin: String,
        client: reqwest::Client,
        timeout_ms: u64,
        online_tx: watch::Sender<bool>,
    ) -> Self {
        Self {
            config,
            origin: origin.trim_end_matches('/').to_string(),
            client,
            timeout_ms,
            partitions: PartitionSet::new(),
            lifecycle: Lifecycle::Waiting,
            online_tx,
        }
    }

    /// Install, optionally activate, then serve messages until every
    /// handle is dropped.
    pub(super) async fn run(mut self, mut rx: mpsc::Receiver<ProxyMessage>) {
        self.install().await;

        if self.config.skip_waiting {
            self.activate();
        }

        while let Some(message) = rx.recv().await {
            match message {
                ProxyMessage::Fetch { request, reply } => {
                    let response = self.handle_fetch(request).await;
                    // Caller may have gone away; nothing to do about it.
                    let _ = reply.send(response);
                }
                ProxyMessage::SkipWaiting => {
                    info!("Skip-wait requested");
                    if self.lifecycle == Lifecycle::Waiting {
                        self.activate();
                    }
                }
            }
        }

        debug!("All proxy handles dropped, shutting down");
    }

    /// Eagerly seed the shell partition from the manifest.
    ///
    /// A single asset failing to cache is logged and skipped; install
    /// itself never fails.
    async fn install(&mut self) {
        info!(assets = self.config.shell_manifest.len(), "Caching proxy installing");

        let manifest = self.config.shell_manifest.clone();
        let shell = self.config.shell_cache.clone();
        for path in manifest {
            let url = format!("{}{}", self.origin, path);
            let request = ProxyRequest::get(&url);

            match self.network(&request).await {
                Ok(response) if response.is_success() => {
                    let key = cache_key(&Method::GET, &url);
                    self.partitions.open(&shell).put(key, response);
                }
                Ok(response) => {
                    warn!(asset = %path, status = response.status, "Failed to cache shell asset");
                }
                Err(e) => {
                    warn!(asset = %path, error = %e, "Failed to cache shell asset");
                }
            }
        }

        let cached = self
            .partitions
            .get(&self.config.shell_cache)
            .map(|p| p.len())
            .unwrap_or(0);
        if cached == 0 && !self.config.shell_manifest.is_empty() {
            warn!("Shell cache is empty, offline navigation will not be available");
        }
        info!(cached, "Caching proxy installed");
    }

    /// Garbage-collect stale partitions and take control of requests.
    fn activate(&mut self) {
        let keep = [
            self.config.shell_cache.as_str(),
            self.config.runtime_cache.as_str(),
        ];
        for name in self.partitions.sweep(&keep) {
            info!(partition = %name, "Deleted stale cache partition");
        }

        self.lifecycle = Lifecycle::Active;
        info!(partitions = ?self.partitions.names(), "Caching proxy active");
    }

    /// Apply the caching policy for one intercepted request.
    async fn handle_fetch(&mut self, request: ProxyRequest) -> ProxyResult<ProxyResponse> {
        let class = classify(&request);

        if class == RequestClass::Bypass {
            return self.network(&request).await;
        }

        // Until activation the previous version is nominally in charge,
        // so nothing is served from or written to our partitions.
        if self.lifecycle == Lifecycle::Waiting {
            debug!(url = %request.url, "Proxy waiting, passing request through");
            return self.network(&request).await;
        }

        match class {
            RequestClass::Shell => {
                let partition = self.config.shell_cache.clone();
                self.cache_first(&partition, &request, true).await
            }
            RequestClass::Asset => {
                let partition = self.config.runtime_cache.clone();
                self.cache_first(&partition, &request, false).await
            }
            RequestClass::Dynamic => self.network_first(&request).await,
            RequestClass::Bypass => unreachable!("bypass handled above"),
        }
    }

    /// Cache-first: serve a stored snapshot when present, otherwise
    /// fetch and store on success. Navigation requests additionally fall
    /// back to the cached root document when the network is down.
    async fn cache_first(
        &mut self,
        partition: &str,
        request: &ProxyRequest,
        navigation_fallback: bool,
    ) -> ProxyResult<ProxyResponse> {
        let key = cache_key(&request.method, &request.url);

        if let Some(hit) = self.partitions.open(partition).get(&key) {
            debug!(url = %request.url, partition, "Cache hit");
            return Ok(hit.clone());
        }

        match self.network(request).await {
            Ok(response) => {
                if response.is_success() {
                    self.partitions.open(partition).put(key, response.clone());
                }
                Ok(response)
            }
            Err(e) if navigation_fallback => {
                let root_key = cache_key(&Method::GET, &format!("{}/index.html", self.origin));
                if let Some(root) = self.partitions.open(partition).get(&root_key) {
                    warn!(url = %request.url, "Offline navigation, serving cached root document");
                    Ok(root.clone())
                } else {
                    Err(e)
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Network-first: always try the network, opportunistically caching
    /// successful API responses, and fall back to a prior runtime entry
    /// when the network fails.
    async fn network_first(&mut self, request: &ProxyRequest) -> ProxyResult<ProxyResponse> {
        let key = cache_key(&request.method, &request.url);
        let partition = self.config.runtime_cache.clone();

        match self.network(request).await {
            Ok(response) => {
                if response.is_success() && is_api_path(&request.url) {
                    self.partitions.open(&partition).put(key, response.clone());
                }
                Ok(response)
            }
            Err(e) => {
                if let Some(hit) = self.partitions.open(&partition).get(&key) {
                    warn!(url = %request.url, "Network failed, serving cached response");
                    Ok(hit.clone())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Perform the real network round trip and update the connectivity
    /// signal from its outcome. Non-2xx statuses are responses, not
    /// errors; callers decide what a bad status means.
    async fn network(&self, request: &ProxyRequest) -> ProxyResult<ProxyResponse> {
        let mut builder = self.client.request(request.method.clone(), &request.url);
        if let Some(body) = &request.body {
            builder = builder
                .header(CONTENT_TYPE, "application/json")
                .body(body.clone());
        }

        match builder.send().await {
            Ok(response) => {
                let _ = self.online_tx.send(true);

                let status = response.status().as_u16();
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(String::from);
                let body = response.bytes().await.map_err(ProxyError::Http)?.to_vec();

                Ok(ProxyResponse {
                    status,
                    content_type,
                    body,
                })
            }
            Err(e) => {
                let _ = self.online_tx.send(false);

                if e.is_timeout() {
                    Err(ProxyError::Timeout {
                        timeout_ms: self.timeout_ms,
                    })
                } else {
                    Err(ProxyError::Network {
                        message: e.to_string(),
                    })
                }
            }
        }
    }
}
