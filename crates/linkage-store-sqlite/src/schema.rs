//! SQL schema for the Linkage SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Rows are never deleted. `link_precedence` and `linked_id` are rewritten
-- only when two clusters merge.
CREATE TABLE IF NOT EXISTS contacts (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    email           TEXT,
    phone_number    TEXT,
    linked_id       INTEGER REFERENCES contacts(id),
    link_precedence TEXT NOT NULL
                    CHECK (link_precedence IN ('primary', 'secondary')),
    created_at      TEXT NOT NULL,   -- RFC 3339 UTC, fixed width
    updated_at      TEXT NOT NULL,
    deleted_at      TEXT,            -- reserved soft-delete marker
    CHECK ((link_precedence = 'primary') = (linked_id IS NULL))
);

CREATE INDEX IF NOT EXISTS contacts_email_idx       ON contacts(email);
CREATE INDEX IF NOT EXISTS contacts_phone_idx       ON contacts(phone_number);
CREATE INDEX IF NOT EXISTS contacts_email_phone_idx ON contacts(email, phone_number);
CREATE INDEX IF NOT EXISTS contacts_linked_idx      ON contacts(linked_id);

PRAGMA user_version = 1;
";
