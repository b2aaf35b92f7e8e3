//! Handler for `POST /identify`.
//!
//! Body: `{"email": "...", "phoneNumber": "..."}`. Either field may be absent
//! or `null`, but not both. `phoneNumber` may also be sent as a JSON integer.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use linkage_core::{Resolver, store::ContactStore};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::{ContactEnvelope, error::ApiError};

/// JSON body accepted by `POST /identify`.
///
/// Fields are kept as raw JSON so that a wrongly-typed value is reported as a
/// 400 with a useful message rather than a generic deserialisation failure.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentifyBody {
  #[serde(default)]
  pub email:        Option<Value>,
  #[serde(default)]
  pub phone_number: Option<Value>,
}

impl IdentifyBody {
  /// Validate field types, returning `(email, phone_number)`.
  pub fn into_parts(self) -> Result<(Option<String>, Option<String>), ApiError> {
    let email = match self.email {
      None | Some(Value::Null) => None,
      Some(Value::String(s)) => Some(s),
      Some(other) => return Err(wrong_type("email", "a string", &other)),
    };
    let phone_number = match self.phone_number {
      None | Some(Value::Null) => None,
      Some(Value::String(s)) => Some(s),
      Some(Value::Number(n)) if n.is_u64() => Some(n.to_string()),
      Some(other) => {
        return Err(wrong_type("phoneNumber", "a string or integer", &other));
      }
    };
    Ok((email, phone_number))
  }
}

fn wrong_type(field: &str, expected: &str, got: &Value) -> ApiError {
  let kind = match got {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  };
  ApiError::BadRequest(format!("{field} must be {expected}, got {kind}"))
}

/// `POST /identify` — resolve the observation and return its cluster.
pub async fn handler<S>(
  State(resolver): State<Resolver<S>>,
  body: Result<Json<IdentifyBody>, JsonRejection>,
) -> Result<Json<ContactEnvelope>, ApiError>
where
  S: ContactStore + 'static,
{
  let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
  let (email, phone_number) = body.into_parts()?;
  debug!(?email, ?phone_number, "identify");

  let view = resolver.resolve(email, phone_number).await?;
  Ok(Json(ContactEnvelope { contact: view }))
}
