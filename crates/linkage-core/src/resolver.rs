//! The identity resolver.
//!
//! [`Resolver::resolve`] folds one observation into the store: it discovers
//! every cluster the observation touches, merges them under the oldest
//! primary, records any new email or phone number as a secondary, and
//! returns the canonical [`ClusterView`]. The whole sequence runs inside a
//! single store transaction.

use std::{
  collections::{BTreeMap, BTreeSet, VecDeque},
  sync::Arc,
};

use tracing::{debug, error, info, warn};

use crate::{
  contact::{Contact, ContactId, NewContact, Observation},
  store::{ContactStore, ContactTx},
  view::ClusterView,
  Error, Result,
};

// ─── Resolver ────────────────────────────────────────────────────────────────

/// Entry point for identity resolution over an injected [`ContactStore`].
///
/// Holds no state of its own; cloning is cheap.
pub struct Resolver<S> {
  store: Arc<S>,
}

impl<S> Clone for Resolver<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
    }
  }
}

impl<S: ContactStore> Resolver<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  pub fn store(&self) -> &Arc<S> { &self.store }

  /// Resolve an `(email, phoneNumber)` observation.
  ///
  /// Fails with [`Error::InvalidInput`] before touching the store when both
  /// values are absent or blank.
  pub async fn resolve(
    &self,
    email: Option<String>,
    phone_number: Option<String>,
  ) -> Result<ClusterView> {
    let observation = Observation::new(email, phone_number)?;
    self.resolve_observation(observation).await
  }

  pub async fn resolve_observation(
    &self,
    observation: Observation,
  ) -> Result<ClusterView> {
    self
      .store
      .transaction(move |tx| resolve_in(tx, &observation))
      .await
  }

  /// The current view of the cluster containing `id`, or `None` if no such
  /// contact exists.
  pub async fn view(&self, id: ContactId) -> Result<Option<ClusterView>> {
    self.store.transaction(move |tx| view_in(tx, id)).await
  }
}

// ─── Transaction bodies ──────────────────────────────────────────────────────

/// Resolve `observation` against an open transaction.
pub fn resolve_in(
  tx: &mut dyn ContactTx,
  observation: &Observation,
) -> Result<ClusterView> {
  let candidates = discover(tx, observation)?;

  if candidates.is_empty() {
    let contact = tx.insert(NewContact::primary(observation))?;
    info!(contact_id = contact.id, "recorded new identity");
    return ClusterView::assemble(&[contact]);
  }

  let survivor = merge(tx, &candidates)?;

  let cluster = tx.find_cluster(survivor)?;
  if cluster.is_empty() {
    return Err(Error::InvariantViolation(format!(
      "primary {survivor} disappeared during resolution"
    )));
  }

  if observation.adds_information_to(&cluster) {
    let contact = tx.insert(NewContact::secondary(observation, survivor))?;
    info!(
      contact_id = contact.id,
      primary_id = survivor,
      "recorded new information as secondary"
    );
  } else {
    debug!(primary_id = survivor, "observation already represented");
  }

  let cluster = tx.find_cluster(survivor)?;
  ClusterView::assemble(&cluster).inspect_err(|e| {
    error!(primary_id = survivor, error = %e, "cluster failed consistency check");
  })
}

/// Assemble the view for whichever cluster contains `id`.
pub fn view_in(
  tx: &mut dyn ContactTx,
  id: ContactId,
) -> Result<Option<ClusterView>> {
  let Some(contact) = tx.get(id)? else {
    return Ok(None);
  };
  let primary_id = if contact.is_primary() {
    contact.id
  } else {
    contact.linked_id.ok_or_else(|| {
      Error::InvariantViolation(format!(
        "secondary contact {id} has no linked primary"
      ))
    })?
  };
  let cluster = tx.find_cluster(primary_id)?;
  ClusterView::assemble(&cluster).map(Some)
}

// ─── Discovery ───────────────────────────────────────────────────────────────

/// Every stored contact reachable from the observation's direct matches by
/// shared email, shared phone number, or `linked_id` in either direction.
///
/// Each distinct email and phone value is looked up at most once, so a large
/// cluster sharing one value costs one lookup for it rather than one per
/// member.
fn discover(
  tx: &mut dyn ContactTx,
  observation: &Observation,
) -> Result<Vec<Contact>> {
  let mut emails_seen: BTreeSet<String> =
    observation.email().map(str::to_owned).into_iter().collect();
  let mut phones_seen: BTreeSet<String> =
    observation.phone_number().map(str::to_owned).into_iter().collect();

  let direct =
    tx.find_by_email_or_phone(observation.email(), observation.phone_number())?;
  debug!(direct_matches = direct.len(), "discovering clusters");

  let mut seen: BTreeMap<ContactId, Contact> = BTreeMap::new();
  let mut queue: VecDeque<Contact> = direct.into();

  while let Some(contact) = queue.pop_front() {
    if seen.contains_key(&contact.id) {
      continue;
    }

    let mut neighbours = Vec::new();
    if let Some(linked_id) = contact.linked_id
      && !seen.contains_key(&linked_id)
    {
      neighbours.extend(tx.get(linked_id)?);
    }
    neighbours.extend(tx.find_linked_to(contact.id)?);

    let email = contact
      .email
      .as_deref()
      .filter(|e| emails_seen.insert((*e).to_owned()));
    let phone_number = contact
      .phone_number
      .as_deref()
      .filter(|p| phones_seen.insert((*p).to_owned()));
    if email.is_some() || phone_number.is_some() {
      neighbours.extend(tx.find_by_email_or_phone(email, phone_number)?);
    }

    seen.insert(contact.id, contact);
    queue.extend(neighbours.into_iter().filter(|c| !seen.contains_key(&c.id)));
  }

  Ok(seen.into_values().collect())
}

// ─── Merge ───────────────────────────────────────────────────────────────────

/// Collapse every cluster in `candidates` under the oldest primary and return
/// its id. A no-op when only one primary is present.
fn merge(tx: &mut dyn ContactTx, candidates: &[Contact]) -> Result<ContactId> {
  let Some(survivor) = candidates
    .iter()
    .filter(|c| c.is_primary())
    .min_by_key(|c| c.seniority())
  else {
    let ids: Vec<ContactId> = candidates.iter().map(|c| c.id).collect();
    error!(?ids, "no primary among discovered contacts");
    return Err(Error::InvariantViolation(format!(
      "no primary among contacts {ids:?}"
    )));
  };

  let mut demoted = Vec::new();
  for other in candidates
    .iter()
    .filter(|c| c.is_primary() && c.id != survivor.id)
  {
    tx.demote_to_secondary(other.id, survivor.id)?;
    let repointed = tx.repoint_secondaries(other.id, survivor.id)?;
    info!(
      primary_id = survivor.id,
      demoted_id = other.id,
      repointed,
      "merged identity clusters"
    );
    demoted.push(other.id);
  }

  // Secondaries that link anywhere other than a primary we just handled are
  // left over from inconsistent data; point them straight at the survivor.
  for stray in candidates.iter().filter(|c| {
    !c.is_primary()
      && !c
        .linked_id
        .is_some_and(|l| l == survivor.id || demoted.contains(&l))
  }) {
    warn!(
      contact_id = stray.id,
      linked_id = ?stray.linked_id,
      primary_id = survivor.id,
      "relinking stray secondary"
    );
    tx.demote_to_secondary(stray.id, survivor.id)?;
  }

  Ok(survivor.id)
}
