use super::expect_changed;
use crate::error::StoreResult;
use crate::model::{Asset, ExternalKey, NewAsset, RowId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, location_id, name, external_key, status";

/// Accessor for the `assets` table.
pub struct Assets<'c> {
    conn: &'c Connection,
}

impl<'c> Assets<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Finds the asset holding `key`.
    pub fn find_by_external_key(&self, key: ExternalKey) -> StoreResult<Option<Asset>> {
        let sql = format!("SELECT {COLUMNS} FROM assets WHERE external_key = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![key], from_row)
            .optional()?)
    }

    /// Finds an asset by name within one location.
    ///
    /// Rows without an external key are preferred so that onboarding
    /// claims unlinked rows before relinking linked ones.
    pub fn find_by_name(&self, location_id: RowId, name: &str) -> StoreResult<Option<Asset>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM assets WHERE location_id = ?1 AND name = ?2 \
             ORDER BY external_key IS NOT NULL, id LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![location_id, name], from_row)
            .optional()?)
    }

    /// Inserts an asset and returns its surrogate id.
    pub fn insert(&self, asset: &NewAsset) -> StoreResult<RowId> {
        self.conn.execute(
            "INSERT INTO assets (location_id, name, external_key, status) VALUES (?1, ?2, ?3, ?4)",
            params![asset.location_id, asset.name, asset.external_key, asset.status],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Writes every column of `asset`.
    pub fn update(&self, asset: &Asset) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE assets SET location_id = ?2, name = ?3, external_key = ?4, status = ?5 \
             WHERE id = ?1",
            params![
                asset.id,
                asset.location_id,
                asset.name,
                asset.external_key,
                asset.status
            ],
        )?;
        expect_changed(changed, "assets", asset.id)
    }

    /// Returns all assets ordered by surrogate id.
    pub fn list(&self) -> StoreResult<Vec<Asset>> {
        let sql = format!("SELECT {COLUMNS} FROM assets ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Returns the number of assets.
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM assets", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Asset> {
    Ok(Asset {
        id: row.get(0)?,
        location_id: row.get(1)?,
        name: row.get(2)?,
        external_key: row.get(3)?,
        status: row.get(4)?,
    })
}
