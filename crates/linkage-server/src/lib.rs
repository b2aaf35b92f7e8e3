//! HTTP server wiring for Linkage.
//!
//! Configuration loading, router assembly and shutdown handling; the binary
//! in `main.rs` strings them together.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use axum::Router;
use linkage_core::{Resolver, store::ContactStore};
use linkage_store_sqlite::StoreOptions;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `LINKAGE_*` environment variables.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:            String,
  #[serde(default = "default_port")]
  pub port:            u16,
  #[serde(default = "default_store_path")]
  pub store_path:      PathBuf,
  #[serde(default = "default_max_tx_attempts")]
  pub max_tx_attempts: u32,
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms: u64,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 3000 }
fn default_store_path() -> PathBuf { PathBuf::from("linkage.db") }
fn default_max_tx_attempts() -> u32 { 5 }
fn default_busy_timeout_ms() -> u64 { 5_000 }

impl ServerConfig {
  /// Layer the (optional) TOML file at `path` under `LINKAGE_*` environment
  /// variables.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("LINKAGE"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions {
      max_attempts: self.max_tx_attempts,
      busy_timeout: Duration::from_millis(self.busy_timeout_ms),
    }
  }

  /// The store path with a leading `~` expanded to the user's home directory.
  pub fn resolved_store_path(&self) -> PathBuf {
    let s = self.store_path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.store_path.clone()
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: API routes plus request tracing.
pub fn app<S>(resolver: Resolver<S>) -> Router
where
  S: ContactStore + 'static,
{
  linkage_api::api_router(resolver).layer(TraceLayer::new_for_http())
}

// ─── Shutdown ─────────────────────────────────────────────────────────────────

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::error!(error = %e, "failed to listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::error!(error = %e, "failed to listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };
  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    () = ctrl_c => {}
    () = terminate => {}
  }
  tracing::info!("shutdown signal received");
}

#[cfg(test)]
mod tests {
  use std::{io::Write as _, sync::Arc};

  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use linkage_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  use super::*;

  #[test]
  fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = ServerConfig::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.max_tx_attempts, 5);
    assert_eq!(cfg.store_options().busy_timeout, Duration::from_secs(5));
  }

  #[test]
  fn file_values_override_defaults() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    writeln!(file, "port = 8081\nstore_path = \"/tmp/contacts.db\"\nmax_tx_attempts = 2")
      .unwrap();

    let cfg = ServerConfig::load(file.path()).unwrap();
    assert_eq!(cfg.port, 8081);
    assert_eq!(cfg.host, "127.0.0.1");
    assert_eq!(cfg.store_path, PathBuf::from("/tmp/contacts.db"));
    assert_eq!(cfg.store_options().max_attempts, 2);
    assert_eq!(cfg.address(), "127.0.0.1:8081");
  }

  #[test]
  fn tilde_is_expanded() {
    let cfg = ServerConfig {
      host:            default_host(),
      port:            default_port(),
      store_path:      PathBuf::from("~/linkage/contacts.db"),
      max_tx_attempts: default_max_tx_attempts(),
      busy_timeout_ms: default_busy_timeout_ms(),
    };
    let resolved = cfg.resolved_store_path();
    if std::env::var("HOME").is_ok() {
      assert!(!resolved.starts_with("~"));
      assert!(resolved.ends_with("linkage/contacts.db"));
    }
  }

  #[tokio::test]
  async fn app_serves_identify_over_sqlite() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let app = app(Resolver::new(Arc::new(store)));

    let req = Request::builder()
      .method("POST")
      .uri("/identify")
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(r#"{"email":"a@x.com","phoneNumber":"111"}"#))
      .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["contact"]["primaryContactId"], 1);
  }
}
