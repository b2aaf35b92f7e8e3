//! Handler for `GET /contacts/{id}`.

use axum::{
  Json,
  extract::{Path, State},
};
use linkage_core::{Resolver, contact::ContactId, store::ContactStore};

use crate::{ContactEnvelope, error::ApiError};

/// `GET /contacts/{id}` — the cluster containing contact `id`; 404 if unknown.
pub async fn get_one<S>(
  State(resolver): State<Resolver<S>>,
  Path(id): Path<ContactId>,
) -> Result<Json<ContactEnvelope>, ApiError>
where
  S: ContactStore + 'static,
{
  let view = resolver
    .view(id)
    .await?
    .ok_or_else(|| ApiError::NotFound(format!("contact {id} not found")))?;
  Ok(Json(ContactEnvelope { contact: view }))
}
