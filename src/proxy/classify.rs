use reqwest::Method;

use super::{Destination, ProxyRequest};

/// Caching policy a request resolves to.
///
/// Every intercepted request lands in exactly one class; the worker
/// applies the matching strategy from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestClass {
    /// Forward untouched, never cached (non-GET, non-http schemes).
    Bypass,
    /// Cache-first against the shell partition (navigation documents).
    Shell,
    /// Cache-first against the runtime partition (static assets).
    Asset,
    /// Network-first with runtime-partition fallback (API calls etc).
    Dynamic,
}

/// Classify a request into its caching policy.
pub fn classify(request: &ProxyRequest) -> RequestClass {
    if request.method != Method::GET {
        return RequestClass::Bypass;
    }

    let url = match reqwest::Url::parse(&request.url) {
        Ok(url) => url,
        // Let the network layer produce the real error for garbage URLs.
        Err(_) => return RequestClass::Bypass,
    };

    if url.scheme() != "http" && url.scheme() != "https" {
        return RequestClass::Bypass;
    }

    match request.destination {
        Destination::Document => RequestClass::Shell,
        Destination::Image | Destination::Font | Destination::Style | Destination::Script => {
            RequestClass::Asset
        }
        Destination::Other => {
            if url.path().starts_with("/assets/") {
                RequestClass::Asset
            } else {
                RequestClass::Dynamic
            }
        }
    }
}

/// Whether a successful dynamic response should be cached opportunistically.
pub fn is_api_path(url: &str) -> bool {
    reqwest::Url::parse(url)
        .map(|u| u.path().contains("/api/"))
        .unwrap_or(false)
}
