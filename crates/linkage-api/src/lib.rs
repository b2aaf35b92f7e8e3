//! JSON REST API for Linkage.
//!
//! Exposes an axum [`Router`] backed by a [`Resolver`] over any
//! [`ContactStore`]. TLS and transport concerns are the caller's
//! responsibility.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/identify` | Body: [`identify::IdentifyBody`]; returns [`ContactEnvelope`] |
//! | `GET`  | `/contacts/{id}` | Cluster containing the contact; 404 if unknown |
//! | `GET`  | `/health` | Liveness probe |

pub mod contacts;
pub mod error;
pub mod identify;

use axum::{
  Json, Router,
  routing::{get, post},
};
use linkage_core::{Resolver, store::ContactStore, view::ClusterView};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub use error::ApiError;

/// Response wrapper: `{"contact": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactEnvelope {
  pub contact: ClusterView,
}

/// Build the API router for `resolver`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(resolver: Resolver<S>) -> Router<()>
where
  S: ContactStore + 'static,
{
  Router::new()
    .route("/identify", post(identify::handler::<S>))
    .route("/contacts/{id}", get(contacts::get_one::<S>))
    .route("/health", get(health))
    .with_state(resolver)
}

async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }
