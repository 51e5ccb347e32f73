use super::expect_changed;
use crate::error::StoreResult;
use crate::model::{ExternalKey, Issue, NewIssue, RowId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, category_id, name, external_key, status";

/// Accessor for the `issues` table.
pub struct Issues<'c> {
    conn: &'c Connection,
}

impl<'c> Issues<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Finds the issue holding `key`.
    pub fn find_by_external_key(&self, key: ExternalKey) -> StoreResult<Option<Issue>> {
        let sql = format!("SELECT {COLUMNS} FROM issues WHERE external_key = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![key], from_row)
            .optional()?)
    }

    /// Finds an issue by name within one category, preferring unlinked rows.
    pub fn find_by_name(&self, category_id: RowId, name: &str) -> StoreResult<Option<Issue>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM issues WHERE category_id = ?1 AND name = ?2 \
             ORDER BY external_key IS NOT NULL, id LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![category_id, name], from_row)
            .optional()?)
    }

    /// Inserts an issue and returns its surrogate id.
    pub fn insert(&self, issue: &NewIssue) -> StoreResult<RowId> {
        self.conn.execute(
            "INSERT INTO issues (category_id, name, external_key, status) VALUES (?1, ?2, ?3, ?4)",
            params![issue.category_id, issue.name, issue.external_key, issue.status],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Writes every column of `issue`.
    pub fn update(&self, issue: &Issue) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE issues SET category_id = ?2, name = ?3, external_key = ?4, status = ?5 \
             WHERE id = ?1",
            params![
                issue.id,
                issue.category_id,
                issue.name,
                issue.external_key,
                issue.status
            ],
        )?;
        expect_changed(changed, "issues", issue.id)
    }

    /// Returns all issues ordered by surrogate id.
    pub fn list(&self) -> StoreResult<Vec<Issue>> {
        let sql = format!("SELECT {COLUMNS} FROM issues ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Returns the number of issues.
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM issues", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Issue> {
    Ok(Issue {
        id: row.get(0)?,
        category_id: row.get(1)?,
        name: row.get(2)?,
        external_key: row.get(3)?,
        status: row.get(4)?,
    })
}
