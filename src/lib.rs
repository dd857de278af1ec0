//! # High IQ adaptive testing engine
//!
//! A client-resident adaptive IQ testing engine with offline
//! resilience. Question content, correctness judging, and final score
//! computation live in a remote service; this crate owns everything on
//! the client side of that boundary.
//!
//! ## Features
//!
//! - **Adaptive difficulty**: each answer moves the target difficulty
//!   up or down inside a tolerance band that narrows over the session
//! - **Session state machine**: retry-safe transitions, early-finish
//!   policy, and retryable finalization
//! - **Offline caching proxy**: intercepts all network traffic and
//!   applies cache-first, asset, or network-first policies per request
//! - **Per-identity history**: a bounded, partitioned local log of
//!   completed test results
//!
//! ## Architecture
//!
//! ```text
//! Session Engine → Bank Client → Caching Proxy → Question Bank (HTTP)
//!       ↓                              ↓
//! History Store (JSON)         Cache Partitions
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use high_iq::bank::QuestionBankClient;
//! use high_iq::history::{FileBackend, HistoryStore};
//! use high_iq::proxy::CachingProxy;
//! use high_iq::session::SessionEngine;
//! use high_iq::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let proxy = CachingProxy::spawn(
//!         config.proxy.clone(),
//!         &config.request,
//!         config.bank.base_url.clone(),
//!     )?;
//!     let history = HistoryStore::new(Arc::new(FileBackend::new(&config.storage.ledger_path)));
//!     let bank = QuestionBankClient::new(proxy.clone(), &config.bank, config.request.clone());
//!     let mut engine = SessionEngine::new(bank, history, proxy.connectivity(), None);
//!     engine.start();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Pure adaptive difficulty controller.
pub mod adaptive;
/// Remote question-bank and scoring client.
pub mod bank;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Per-identity persisted history of test results.
pub mod history;
/// Offline caching proxy and connectivity signal.
pub mod proxy;
/// Test session state machine.
pub mod session;

pub use config::Config;
pub use error::{AppError, AppResult};
