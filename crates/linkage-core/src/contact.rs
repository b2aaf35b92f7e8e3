//! Contact records and the observations that produce them.
//!
//! A contact is one partial sighting of a person: an email, a phone number, or
//! both. Contacts that share either value belong to the same identity cluster,
//! and exactly one contact per cluster is its primary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Store-assigned, monotonically increasing contact identifier.
pub type ContactId = i64;

// ─── Precedence ──────────────────────────────────────────────────────────────

/// Whether a contact is the canonical record of its cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkPrecedence {
  Primary,
  Secondary,
}

impl LinkPrecedence {
  /// The string stored in the `link_precedence` column.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Primary => "primary",
      Self::Secondary => "secondary",
    }
  }
}

// ─── Contact ─────────────────────────────────────────────────────────────────

/// A persisted contact record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
  pub id:              ContactId,
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  /// Set only on secondaries; always the id of the cluster's primary.
  pub linked_id:       Option<ContactId>,
  pub link_precedence: LinkPrecedence,
  /// Server-assigned; decides primacy when clusters merge.
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  /// Reserved soft-delete marker. Never written by the resolver.
  pub deleted_at:      Option<DateTime<Utc>>,
}

impl Contact {
  pub fn is_primary(&self) -> bool {
    self.link_precedence == LinkPrecedence::Primary
  }

  /// Ordering key for primacy: earliest creation wins, lower id breaks ties.
  pub fn seniority(&self) -> (DateTime<Utc>, ContactId) {
    (self.created_at, self.id)
  }
}

// ─── NewContact ──────────────────────────────────────────────────────────────

/// Input to [`crate::store::ContactTx::insert`].
/// `id` and all timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewContact {
  pub email:           Option<String>,
  pub phone_number:    Option<String>,
  pub linked_id:       Option<ContactId>,
  pub link_precedence: LinkPrecedence,
}

impl NewContact {
  /// First sighting of an identity.
  pub fn primary(observation: &Observation) -> Self {
    Self {
      email:           observation.email.clone(),
      phone_number:    observation.phone_number.clone(),
      linked_id:       None,
      link_precedence: LinkPrecedence::Primary,
    }
  }

  /// New information attached to the cluster headed by `primary_id`.
  pub fn secondary(observation: &Observation, primary_id: ContactId) -> Self {
    Self {
      email:           observation.email.clone(),
      phone_number:    observation.phone_number.clone(),
      linked_id:       Some(primary_id),
      link_precedence: LinkPrecedence::Secondary,
    }
  }
}

// ─── Observation ─────────────────────────────────────────────────────────────

/// A validated `(email, phoneNumber)` pair submitted for resolution.
///
/// Values are trimmed and empty strings count as absent, so an observation
/// always carries at least one non-empty identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
  email:        Option<String>,
  phone_number: Option<String>,
}

impl Observation {
  pub fn new(
    email: Option<String>,
    phone_number: Option<String>,
  ) -> Result<Self> {
    let email = normalize(email);
    let phone_number = normalize(phone_number);
    if email.is_none() && phone_number.is_none() {
      return Err(Error::InvalidInput(
        "email or phoneNumber must be provided".to_owned(),
      ));
    }
    Ok(Self { email, phone_number })
  }

  pub fn email(&self) -> Option<&str> { self.email.as_deref() }

  pub fn phone_number(&self) -> Option<&str> { self.phone_number.as_deref() }

  /// True when this observation carries an email or phone number that no
  /// member of `cluster` already holds.
  pub fn adds_information_to(&self, cluster: &[Contact]) -> bool {
    let new_email = self.email().is_some_and(|email| {
      !cluster.iter().any(|c| c.email.as_deref() == Some(email))
    });
    let new_phone = self.phone_number().is_some_and(|phone| {
      !cluster.iter().any(|c| c.phone_number.as_deref() == Some(phone))
    });
    new_email || new_phone
  }
}

fn normalize(value: Option<String>) -> Option<String> {
  value
    .map(|v| v.trim().to_owned())
    .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn contact(id: ContactId, email: Option<&str>, phone: Option<&str>) -> Contact {
    let now = Utc::now();
    Contact {
      id,
      email: email.map(str::to_owned),
      phone_number: phone.map(str::to_owned),
      linked_id: None,
      link_precedence: LinkPrecedence::Primary,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    }
  }

  #[test]
  fn observation_requires_an_identifier() {
    let err = Observation::new(None, None).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
  }

  #[test]
  fn blank_values_count_as_absent() {
    let err = Observation::new(Some("  ".into()), Some(String::new())).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));

    let obs = Observation::new(Some(" a@x.com ".into()), Some(" ".into())).unwrap();
    assert_eq!(obs.email(), Some("a@x.com"));
    assert_eq!(obs.phone_number(), None);
  }

  #[test]
  fn new_information_is_detected_per_field() {
    let cluster = vec![
      contact(1, Some("a@x.com"), Some("111")),
      contact(2, Some("b@x.com"), None),
    ];

    let dup = Observation::new(Some("b@x.com".into()), Some("111".into())).unwrap();
    assert!(!dup.adds_information_to(&cluster));

    let only_email = Observation::new(Some("a@x.com".into()), None).unwrap();
    assert!(!only_email.adds_information_to(&cluster));

    let new_phone = Observation::new(Some("a@x.com".into()), Some("222".into())).unwrap();
    assert!(new_phone.adds_information_to(&cluster));

    let new_email = Observation::new(Some("c@x.com".into()), None).unwrap();
    assert!(new_email.adds_information_to(&cluster));
  }

  #[test]
  fn precedence_serializes_lowercase() {
    assert_eq!(
      serde_json::to_string(&LinkPrecedence::Secondary).unwrap(),
      "\"secondary\""
    );
    assert_eq!(LinkPrecedence::Primary.as_str(), "primary");
  }
}
