//! Table definitions for fresh databases.
//!
//! This only creates what is missing; it does not migrate existing tables.

use crate::error::StoreResult;
use rusqlite::Connection;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS locations (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT    NOT NULL UNIQUE,
    external_key INTEGER UNIQUE
);

CREATE TABLE IF NOT EXISTS assets (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id  INTEGER NOT NULL REFERENCES locations(id) ON DELETE CASCADE,
    name         TEXT    NOT NULL,
    external_key INTEGER UNIQUE,
    status       TEXT
);
CREATE INDEX IF NOT EXISTS assets_location_name ON assets(location_id, name);

CREATE TABLE IF NOT EXISTS issue_categories (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT    NOT NULL UNIQUE,
    external_key INTEGER UNIQUE
);

CREATE TABLE IF NOT EXISTS issues (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    category_id  INTEGER NOT NULL REFERENCES issue_categories(id) ON DELETE CASCADE,
    name         TEXT    NOT NULL,
    external_key INTEGER UNIQUE,
    status       TEXT
);
CREATE INDEX IF NOT EXISTS issues_category_name ON issues(category_id, name);

CREATE TABLE IF NOT EXISTS operators (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name   TEXT    NOT NULL,
    last_name    TEXT    NOT NULL,
    messaging_id TEXT    NOT NULL UNIQUE,
    secret       TEXT    NOT NULL UNIQUE,
    external_key INTEGER UNIQUE,
    created_at   TEXT    NOT NULL,
    updated_at   TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS submissions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    location_key INTEGER NOT NULL,
    asset_key    INTEGER NOT NULL,
    category_key INTEGER NOT NULL,
    issue_key    INTEGER NOT NULL,
    comment      TEXT,
    file_names   TEXT,
    submitter    TEXT,
    created_at   TEXT    NOT NULL
);
";

/// Creates all tables and indexes that do not exist yet.
pub(crate) fn bootstrap(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
