//! The canonical, read-only view of an identity cluster.

use serde::{Deserialize, Serialize};

use crate::{
  contact::{Contact, ContactId},
  Error, Result,
};

/// What callers see for a resolved identity. Computed from the cluster's
/// records on every read; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterView {
  pub primary_contact_id:    ContactId,
  /// The primary's email first, then every other distinct email in creation
  /// order.
  pub emails:                Vec<String>,
  /// The primary's phone number first, then every other distinct number in
  /// creation order.
  pub phone_numbers:         Vec<String>,
  pub secondary_contact_ids: Vec<ContactId>,
}

impl ClusterView {
  /// Build the view for a complete cluster (primary plus all secondaries).
  ///
  /// Fails with [`Error::InvariantViolation`] unless the cluster has exactly
  /// one primary and every other member links directly to it.
  pub fn assemble(cluster: &[Contact]) -> Result<Self> {
    let primaries: Vec<&Contact> =
      cluster.iter().filter(|c| c.is_primary()).collect();
    let [primary] = primaries.as_slice() else {
      return Err(Error::InvariantViolation(format!(
        "expected exactly one primary in cluster, found {}",
        primaries.len()
      )));
    };

    let mut secondaries: Vec<&Contact> =
      cluster.iter().filter(|c| c.id != primary.id).collect();
    secondaries.sort_by_key(|c| c.seniority());

    if let Some(stray) =
      secondaries.iter().find(|c| c.linked_id != Some(primary.id))
    {
      return Err(Error::InvariantViolation(format!(
        "contact {} links to {:?}, not to primary {}",
        stray.id, stray.linked_id, primary.id
      )));
    }

    let mut emails = Vec::new();
    let mut phone_numbers = Vec::new();
    for contact in std::iter::once(*primary).chain(secondaries.iter().copied()) {
      push_distinct(&mut emails, contact.email.as_deref());
      push_distinct(&mut phone_numbers, contact.phone_number.as_deref());
    }

    Ok(Self {
      primary_contact_id: primary.id,
      emails,
      phone_numbers,
      secondary_contact_ids: secondaries.iter().map(|c| c.id).collect(),
    })
  }
}

fn push_distinct(values: &mut Vec<String>, value: Option<&str>) {
  if let Some(value) = value
    && !values.iter().any(|v| v == value)
  {
    values.push(value.to_owned());
  }
}

#[cfg(test)]
mod tests {
  use chrono::{Duration, Utc};

  use super::*;
  use crate::contact::LinkPrecedence;

  fn record(
    id: ContactId,
    email: Option<&str>,
    phone: Option<&str>,
    linked_id: Option<ContactId>,
    minutes: i64,
  ) -> Contact {
    let at = Utc::now() + Duration::minutes(minutes);
    Contact {
      id,
      email: email.map(str::to_owned),
      phone_number: phone.map(str::to_owned),
      linked_id,
      link_precedence: if linked_id.is_some() {
        LinkPrecedence::Secondary
      } else {
        LinkPrecedence::Primary
      },
      created_at: at,
      updated_at: at,
      deleted_at: None,
    }
  }

  #[test]
  fn primary_values_come_first() {
    // Secondary 7 is older than secondary 3, and the primary's own values
    // lead regardless of where they also appear.
    let cluster = vec![
      record(3, Some("late@x.com"), Some("111"), Some(1), 20),
      record(1, Some("p@x.com"), None, None, 0),
      record(7, Some("early@x.com"), Some("222"), Some(1), 10),
    ];

    let view = ClusterView::assemble(&cluster).unwrap();
    assert_eq!(view.primary_contact_id, 1);
    assert_eq!(view.emails, ["p@x.com", "early@x.com", "late@x.com"]);
    assert_eq!(view.phone_numbers, ["222", "111"]);
    assert_eq!(view.secondary_contact_ids, [7, 3]);
  }

  #[test]
  fn duplicate_values_are_reported_once() {
    let cluster = vec![
      record(1, Some("a@x.com"), Some("111"), None, 0),
      record(2, Some("a@x.com"), Some("222"), Some(1), 1),
      record(3, Some("b@x.com"), Some("111"), Some(1), 2),
    ];

    let view = ClusterView::assemble(&cluster).unwrap();
    assert_eq!(view.emails, ["a@x.com", "b@x.com"]);
    assert_eq!(view.phone_numbers, ["111", "222"]);
  }

  #[test]
  fn missing_primary_is_an_invariant_violation() {
    let cluster = vec![record(2, Some("a@x.com"), None, Some(1), 0)];
    let err = ClusterView::assemble(&cluster).unwrap_err();
    assert!(matches!(err, Error::InvariantViolation(_)));
  }

  #[test]
  fn chained_secondary_is_an_invariant_violation() {
    let cluster = vec![
      record(1, Some("a@x.com"), None, None, 0),
      record(2, Some("b@x.com"), None, Some(1), 1),
      record(3, Some("c@x.com"), None, Some(2), 2),
    ];
    let err = ClusterView::assemble(&cluster).unwrap_err();
    assert!(matches!(err, Error::InvariantViolation(_)));
  }

  #[test]
  fn serializes_in_camel_case() {
    let view = ClusterView {
      primary_contact_id:    1,
      emails:                vec!["a@x.com".into()],
      phone_numbers:         vec!["111".into()],
      secondary_contact_ids: vec![],
    };
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(
      json,
      serde_json::json!({
        "primaryContactId": 1,
        "emails": ["a@x.com"],
        "phoneNumbers": ["111"],
        "secondaryContactIds": [],
      })
    );
  }
}
