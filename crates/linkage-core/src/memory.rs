//! In-memory [`ContactStore`] backend.
//!
//! Intended for embedded usage, tests, and as a reference implementation.
//! Transactions are serialised by a mutex; each one works on a copy of the
//! state that replaces the shared state only when the closure succeeds.

use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::{
  contact::{Contact, ContactId, LinkPrecedence, NewContact},
  store::{ContactStore, ContactTx},
  Error, Result,
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
  contacts: Vec<Contact>,
  next_id:  ContactId,
}

/// A contact store that lives entirely in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
  state: Mutex<MemoryState>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  /// Seed a store with existing records. New ids continue after the largest
  /// seeded id.
  pub fn from_contacts(contacts: Vec<Contact>) -> Self {
    let next_id = contacts.iter().map(|c| c.id).max().unwrap_or(0);
    Self {
      state: Mutex::new(MemoryState { contacts, next_id }),
    }
  }

  /// A copy of every stored contact, ordered by id.
  pub fn snapshot(&self) -> Result<Vec<Contact>> {
    let mut contacts = self.lock()?.contacts.clone();
    contacts.sort_by_key(|c| c.id);
    Ok(contacts)
  }

  fn lock(&self) -> Result<MutexGuard<'_, MemoryState>> {
    self
      .state
      .lock()
      .map_err(|_| Error::storage("poisoned lock: memory store"))
  }
}

impl ContactStore for MemoryStore {
  async fn transaction<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: Fn(&mut dyn ContactTx) -> Result<T> + Send + 'static,
  {
    let mut guard = self.lock()?;
    let mut working = guard.clone();
    let value = f(&mut MemoryTx {
      state: &mut working,
    })?;
    *guard = working;
    Ok(value)
  }

  async fn count(&self) -> Result<usize> { Ok(self.lock()?.contacts.len()) }
}

// ─── Transaction ─────────────────────────────────────────────────────────────

struct MemoryTx<'a> {
  state: &'a mut MemoryState,
}

impl MemoryTx<'_> {
  fn select(&self, pred: impl Fn(&Contact) -> bool) -> Vec<Contact> {
    self.state.contacts.iter().filter(|c| pred(c)).cloned().collect()
  }

  fn get_mut(&mut self, id: ContactId) -> Result<&mut Contact> {
    self
      .state
      .contacts
      .iter_mut()
      .find(|c| c.id == id)
      .ok_or_else(|| {
        Error::InvariantViolation(format!("contact {id} does not exist"))
      })
  }
}

impl ContactTx for MemoryTx<'_> {
  fn get(&mut self, id: ContactId) -> Result<Option<Contact>> {
    Ok(self.state.contacts.iter().find(|c| c.id == id).cloned())
  }

  fn find_by_email_or_phone(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> Result<Vec<Contact>> {
    Ok(self.select(|c| {
      (email.is_some() && c.email.as_deref() == email)
        || (phone_number.is_some() && c.phone_number.as_deref() == phone_number)
    }))
  }

  fn find_linked_to(&mut self, id: ContactId) -> Result<Vec<Contact>> {
    Ok(self.select(|c| c.linked_id == Some(id)))
  }

  fn insert(&mut self, input: NewContact) -> Result<Contact> {
    self.state.next_id += 1;
    let now = Utc::now();
    let contact = Contact {
      id:              self.state.next_id,
      email:           input.email,
      phone_number:    input.phone_number,
      linked_id:       input.linked_id,
      link_precedence: input.link_precedence,
      created_at:      now,
      updated_at:      now,
      deleted_at:      None,
    };
    self.state.contacts.push(contact.clone());
    Ok(contact)
  }

  fn demote_to_secondary(
    &mut self,
    id: ContactId,
    new_linked_id: ContactId,
  ) -> Result<()> {
    let contact = self.get_mut(id)?;
    contact.link_precedence = LinkPrecedence::Secondary;
    contact.linked_id = Some(new_linked_id);
    contact.updated_at = Utc::now();
    Ok(())
  }

  fn repoint_secondaries(
    &mut self,
    old_primary_id: ContactId,
    new_primary_id: ContactId,
  ) -> Result<usize> {
    let now = Utc::now();
    let mut moved = 0;
    for contact in self
      .state
      .contacts
      .iter_mut()
      .filter(|c| c.linked_id == Some(old_primary_id))
    {
      contact.linked_id = Some(new_primary_id);
      contact.updated_at = now;
      moved += 1;
    }
    Ok(moved)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn new_contact(email: &str) -> NewContact {
    NewContact {
      email:           Some(email.to_owned()),
      phone_number:    None,
      linked_id:       None,
      link_precedence: LinkPrecedence::Primary,
    }
  }

  #[tokio::test]
  async fn failed_transaction_leaves_state_untouched() {
    let store = MemoryStore::new();
    let err = store
      .transaction(|tx| {
        tx.insert(new_contact("a@x.com"))?;
        Err::<(), _>(Error::InvariantViolation("abort".into()))
      })
      .await
      .unwrap_err();

    assert!(matches!(err, Error::InvariantViolation(_)));
    assert_eq!(store.count().await.unwrap(), 0);
  }

  #[tokio::test]
  async fn ids_are_monotonic() {
    let store = MemoryStore::new();
    let ids = store
      .transaction(|tx| {
        let a = tx.insert(new_contact("a@x.com"))?;
        let b = tx.insert(new_contact("b@x.com"))?;
        Ok((a.id, b.id))
      })
      .await
      .unwrap();
    assert_eq!(ids, (1, 2));
  }

  #[tokio::test]
  async fn none_matches_nothing() {
    let store = MemoryStore::new();
    let found = store
      .transaction(|tx| {
        tx.insert(NewContact {
          email:           None,
          phone_number:    Some("111".into()),
          linked_id:       None,
          link_precedence: LinkPrecedence::Primary,
        })?;
        tx.find_by_email_or_phone(None, None)
      })
      .await
      .unwrap();
    assert!(found.is_empty());
  }
}
