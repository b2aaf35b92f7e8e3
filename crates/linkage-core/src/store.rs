//! The `ContactStore` trait and its transaction handle.
//!
//! The trait is implemented by storage backends (e.g. `linkage-store-sqlite`
//! and [`crate::memory::MemoryStore`]). The resolver depends on this
//! abstraction only.
//!
//! Every read and write the resolver issues goes through a [`ContactTx`]
//! handed to the closure passed to [`ContactStore::transaction`]. The closure
//! is synchronous so that backends can run it on whatever thread owns the
//! underlying connection, and it is `Fn` so that a backend may re-run it from
//! the top after a write conflict.

use std::future::Future;

use crate::{
  contact::{Contact, ContactId, NewContact},
  Result,
};

// ─── Transaction handle ──────────────────────────────────────────────────────

/// Operations available inside a single store transaction.
pub trait ContactTx {
  /// Fetch one contact by id.
  fn get(&mut self, id: ContactId) -> Result<Option<Contact>>;

  /// Every contact whose email equals `email` or whose phone number equals
  /// `phone_number`. A `None` argument matches nothing.
  fn find_by_email_or_phone(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>>;

  /// Every contact whose `linked_id` is `id`.
  fn find_linked_to(&mut self, id: ContactId) -> Result<Vec<Contact>>;

  /// The primary `primary_id` plus all secondaries pointing at it. Empty when
  /// the primary does not exist.
  fn find_cluster(&mut self, primary_id: ContactId) -> Result<Vec<Contact>> {
    let Some(primary) = self.get(primary_id)? else {
      return Ok(Vec::new());
    };
    let mut cluster = vec![primary];
    cluster.extend(self.find_linked_to(primary_id)?);
    Ok(cluster)
  }

  /// Persist a new contact, assigning its id and timestamps.
  fn insert(&mut self, input: NewContact) -> Result<Contact>;

  /// Mark `id` as a secondary of `new_linked_id` and touch `updated_at`.
  /// Also used to re-point a single stray secondary.
  fn demote_to_secondary(
    &mut self,
    id: ContactId,
    new_linked_id: ContactId,
  ) -> Result<()>;

  /// Re-point every contact linked to `old_primary_id` at `new_primary_id`.
  /// Returns the number of contacts moved.
  fn repoint_secondaries(
    &mut self,
    old_primary_id: ContactId,
    new_primary_id: ContactId,
  ) -> Result<usize>;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Abstraction over a Linkage contact store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ContactStore: Send + Sync {
  /// Run `f` inside one serialisable transaction.
  ///
  /// The transaction commits when `f` returns `Ok` and rolls back otherwise.
  /// On a write conflict the backend rolls back and calls `f` again from the
  /// beginning; `f` must therefore not carry state between invocations.
  fn transaction<T, F>(
    &self,
    f: F,
  ) -> impl Future<Output = Result<T>> + Send + '_
  where
    T: Send + 'static,
    F: Fn(&mut dyn ContactTx) -> Result<T> + Send + 'static;

  /// Total number of stored contacts.
  fn count(&self) -> impl Future<Output = Result<usize>> + Send + '_;
}
