use super::expect_changed;
use crate::error::StoreResult;
use crate::model::{ExternalKey, Location, NewLocation, RowId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, name, external_key";

/// Accessor for the `locations` table.
pub struct Locations<'c> {
    conn: &'c Connection,
}

impl<'c> Locations<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Finds the location holding `key`.
    pub fn find_by_external_key(&self, key: ExternalKey) -> StoreResult<Option<Location>> {
        let sql = format!("SELECT {COLUMNS} FROM locations WHERE external_key = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![key], from_row)
            .optional()?)
    }

    /// Finds a location by name.
    pub fn find_by_name(&self, name: &str) -> StoreResult<Option<Location>> {
        let sql = format!("SELECT {COLUMNS} FROM locations WHERE name = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![name], from_row)
            .optional()?)
    }

    /// Inserts a location and returns its surrogate id.
    pub fn insert(&self, location: &NewLocation) -> StoreResult<RowId> {
        self.conn.execute(
            "INSERT INTO locations (name, external_key) VALUES (?1, ?2)",
            params![location.name, location.external_key],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Writes every column of `location`.
    pub fn update(&self, location: &Location) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE locations SET name = ?2, external_key = ?3 WHERE id = ?1",
            params![location.id, location.name, location.external_key],
        )?;
        expect_changed(changed, "locations", location.id)
    }

    /// Returns all locations ordered by surrogate id.
    pub fn list(&self) -> StoreResult<Vec<Location>> {
        let sql = format!("SELECT {COLUMNS} FROM locations ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Returns the number of locations.
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM locations", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Location> {
    Ok(Location {
        id: row.get(0)?,
        name: row.get(1)?,
        external_key: row.get(2)?,
    })
}
