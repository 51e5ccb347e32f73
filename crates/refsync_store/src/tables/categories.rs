use super::expect_changed;
use crate::error::StoreResult;
use crate::model::{ExternalKey, IssueCategory, NewIssueCategory, RowId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, name, external_key";

/// Accessor for the `issue_categories` table.
pub struct IssueCategories<'c> {
    conn: &'c Connection,
}

impl<'c> IssueCategories<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Finds the category holding `key`.
    pub fn find_by_external_key(&self, key: ExternalKey) -> StoreResult<Option<IssueCategory>> {
        let sql = format!("SELECT {COLUMNS} FROM issue_categories WHERE external_key = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![key], from_row)
            .optional()?)
    }

    /// Finds a category by name.
    pub fn find_by_name(&self, name: &str) -> StoreResult<Option<IssueCategory>> {
        let sql = format!("SELECT {COLUMNS} FROM issue_categories WHERE name = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![name], from_row)
            .optional()?)
    }

    /// Inserts a category and returns its surrogate id.
    pub fn insert(&self, category: &NewIssueCategory) -> StoreResult<RowId> {
        self.conn.execute(
            "INSERT INTO issue_categories (name, external_key) VALUES (?1, ?2)",
            params![category.name, category.external_key],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Writes every column of `category`.
    pub fn update(&self, category: &IssueCategory) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE issue_categories SET name = ?2, external_key = ?3 WHERE id = ?1",
            params![category.id, category.name, category.external_key],
        )?;
        expect_changed(changed, "issue_categories", category.id)
    }

    /// Returns all categories ordered by surrogate id.
    pub fn list(&self) -> StoreResult<Vec<IssueCategory>> {
        let sql = format!("SELECT {COLUMNS} FROM issue_categories ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Returns the number of categories.
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM issue_categories", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<IssueCategory> {
    Ok(IssueCategory {
        id: row.get(0)?,
        name: row.get(1)?,
        external_key: row.get(2)?,
    })
}
