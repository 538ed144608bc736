//! HTTP server wiring for Casebook: configuration and the top-level router.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use axum::{Router, routing::get};
use casebook_core::{CaseEngine, ReleasePolicy, store::AssignmentStore};
use chrono::Duration;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `casebook.toml` and
/// `CASEBOOK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                    String,
  #[serde(default = "default_port")]
  pub port:                    u16,
  #[serde(default = "default_store_path")]
  pub store_path:              PathBuf,
  /// Days between a release and its scheduled follow-up review.
  #[serde(default = "default_follow_up_interval_days")]
  pub follow_up_interval_days: u32,
}

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 8080 }

fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/casebook/casebook.db") }

fn default_follow_up_interval_days() -> u32 { 30 }

impl ServerConfig {
  pub fn release_policy(&self) -> ReleasePolicy {
    ReleasePolicy {
      follow_up_interval: Duration::days(i64::from(self.follow_up_interval_days)),
    }
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// The full application: the JSON API under `/api`, plus a liveness probe.
pub fn app<S>(engine: Arc<CaseEngine<S>>) -> Router
where
  S: AssignmentStore + 'static,
{
  Router::new()
    .route("/healthz", get(|| async { "ok" }))
    .nest("/api", casebook_api::api_router(engine))
    .layer(TraceLayer::new_for_http())
}
