//! [`SqliteStore`] — the SQLite implementation of [`ContactStore`].

use std::{path::Path, thread, time::Duration};

use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tracing::warn;

use linkage_core::{
  contact::{Contact, ContactId, NewContact},
  store::{ContactStore, ContactTx},
};

use crate::{
  encode::{encode_dt, encode_precedence, now, RawContact, CONTACT_COLUMNS},
  schema::SCHEMA,
  Error, Result,
};

/// Pause before the first retry; multiplied by the attempt number after that.
const RETRY_BACKOFF: Duration = Duration::from_millis(10);

// ─── Options ─────────────────────────────────────────────────────────────────

/// Tuning knobs for conflict handling.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  /// How many times a transaction is attempted before a write conflict is
  /// reported to the caller.
  pub max_attempts: u32,
  /// How long SQLite waits on a locked database before reporting busy.
  pub busy_timeout: Duration,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self {
      max_attempts: 5,
      busy_timeout: Duration::from_secs(5),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Linkage contact store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:         tokio_rusqlite::Connection,
  max_attempts: u32,
}

impl SqliteStore {
  /// Open (or create) a store at `path` with default options.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    Self::open_with(path, StoreOptions::default()).await
  }

  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open_with(
    path: impl AsRef<Path>,
    options: StoreOptions,
  ) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn, options).await
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn, StoreOptions::default()).await
  }

  async fn init(
    conn: tokio_rusqlite::Connection,
    options: StoreOptions,
  ) -> Result<Self> {
    let busy_timeout = options.busy_timeout;
    conn
      .call(move |conn| {
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(Self {
      conn,
      max_attempts: options.max_attempts.max(1),
    })
  }
}

/// Run `f` in an immediate transaction, starting over on lock conflicts.
fn run_with_retry<T, F>(
  conn: &mut rusqlite::Connection,
  f: &F,
  max_attempts: u32,
) -> linkage_core::Result<T>
where
  F: Fn(&mut dyn ContactTx) -> linkage_core::Result<T>,
{
  let mut attempt = 1;
  loop {
    match run_once(conn, f) {
      Err(e) if attempt < max_attempts && is_conflict(&e) => {
        warn!(attempt, max_attempts, error = %e, "write conflict, retrying transaction");
        thread::sleep(RETRY_BACKOFF * attempt);
        attempt += 1;
      }
      outcome => return outcome,
    }
  }
}

fn run_once<T, F>(
  conn: &mut rusqlite::Connection,
  f: &F,
) -> linkage_core::Result<T>
where
  F: Fn(&mut dyn ContactTx) -> linkage_core::Result<T>,
{
  // IMMEDIATE takes the write lock up front, so two resolutions can never
  // both read "no candidates" and insert.
  let tx = conn
    .transaction_with_behavior(TransactionBehavior::Immediate)
    .map_err(Error::Sqlite)?;
  let value = f(&mut SqliteTx { conn: &tx })?;
  tx.commit().map_err(Error::Sqlite)?;
  Ok(value)
}

fn is_conflict(err: &linkage_core::Error) -> bool {
  match err {
    linkage_core::Error::Storage(source) => source
      .downcast_ref::<Error>()
      .is_some_and(Error::is_conflict),
    _ => false,
  }
}

// ─── ContactStore impl ───────────────────────────────────────────────────────

impl ContactStore for SqliteStore {
  async fn transaction<T, F>(&self, f: F) -> linkage_core::Result<T>
  where
    T: Send + 'static,
    F: Fn(&mut dyn ContactTx) -> linkage_core::Result<T> + Send + 'static,
  {
    let max_attempts = self.max_attempts;
    self
      .conn
      .call(move |conn| Ok(run_with_retry(conn, &f, max_attempts)))
      .await
      .map_err(Error::Database)?
  }

  async fn count(&self) -> linkage_core::Result<usize> {
    let count: i64 = self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM contacts", [], |r| r.get(0))?)
      })
      .await
      .map_err(Error::Database)?;
    Ok(count as usize)
  }
}

// ─── Transaction handle ──────────────────────────────────────────────────────

/// [`ContactTx`] over an open rusqlite transaction.
struct SqliteTx<'c> {
  conn: &'c rusqlite::Connection,
}

impl SqliteTx<'_> {
  fn query(
    &self,
    filter: &str,
    params: impl rusqlite::Params,
  ) -> linkage_core::Result<Vec<Contact>> {
    let sql =
      format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE {filter} ORDER BY id");
    let raws = self
      .conn
      .prepare_cached(&sql)
      .and_then(|mut stmt| {
        let rows = stmt
          .query_map(params, RawContact::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .map_err(Error::Sqlite)?;

    Ok(
      raws
        .into_iter()
        .map(RawContact::into_contact)
        .collect::<Result<_>>()?,
    )
  }

  fn expect_one(&self, changed: usize, id: ContactId) -> linkage_core::Result<()> {
    if changed == 1 {
      Ok(())
    } else {
      Err(linkage_core::Error::InvariantViolation(format!(
        "contact {id} does not exist"
      )))
    }
  }
}

impl ContactTx for SqliteTx<'_> {
  fn get(&mut self, id: ContactId) -> linkage_core::Result<Option<Contact>> {
    let raw = self
      .conn
      .query_row(
        &format!("SELECT {CONTACT_COLUMNS} FROM contacts WHERE id = ?1"),
        rusqlite::params![id],
        RawContact::from_row,
      )
      .optional()
      .map_err(Error::Sqlite)?;
    Ok(raw.map(RawContact::into_contact).transpose()?)
  }

  fn find_by_email_or_phone(
    &mut self,
    email: Option<&str>,
    phone_number: Option<&str>,
  ) -> linkage_core::Result<Vec<Contact>> {
    if email.is_none() && phone_number.is_none() {
      return Ok(Vec::new());
    }
    self.query(
      "(?1 IS NOT NULL AND email = ?1) OR (?2 IS NOT NULL AND phone_number = ?2)",
      rusqlite::params![email, phone_number],
    )
  }

  fn find_linked_to(&mut self, id: ContactId) -> linkage_core::Result<Vec<Contact>> {
    self.query("linked_id = ?1", rusqlite::params![id])
  }

  fn find_cluster(&mut self, primary_id: ContactId) -> linkage_core::Result<Vec<Contact>> {
    self.query("id = ?1 OR linked_id = ?1", rusqlite::params![primary_id])
  }

  fn insert(&mut self, input: NewContact) -> linkage_core::Result<Contact> {
    let at = now();
    let at_str = encode_dt(at);
    self
      .conn
      .execute(
        "INSERT INTO contacts (
           email, phone_number, linked_id, link_precedence, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
        rusqlite::params![
          input.email,
          input.phone_number,
          input.linked_id,
          encode_precedence(input.link_precedence),
          at_str,
        ],
      )
      .map_err(Error::Sqlite)?;

    Ok(Contact {
      id:              self.conn.last_insert_rowid(),
      email:           input.email,
      phone_number:    input.phone_number,
      linked_id:       input.linked_id,
      link_precedence: input.link_precedence,
      created_at:      at,
      updated_at:      at,
      deleted_at:      None,
    })
  }

  fn demote_to_secondary(
    &mut self,
    id: ContactId,
    new_linked_id: ContactId,
  ) -> linkage_core::Result<()> {
    let changed = self
      .conn
      .execute(
        "UPDATE contacts
            SET link_precedence = 'secondary', linked_id = ?1, updated_at = ?2
          WHERE id = ?3",
        rusqlite::params![new_linked_id, encode_dt(now()), id],
      )
      .map_err(Error::Sqlite)?;
    self.expect_one(changed, id)
  }

  fn repoint_secondaries(
    &mut self,
    old_primary_id: ContactId,
    new_primary_id: ContactId,
  ) -> linkage_core::Result<usize> {
    Ok(
      self
        .conn
        .execute(
          "UPDATE contacts SET linked_id = ?1, updated_at = ?2 WHERE linked_id = ?3",
          rusqlite::params![new_primary_id, encode_dt(now()), old_primary_id],
        )
        .map_err(Error::Sqlite)?,
    )
  }
}
