use crate::error::StoreResult;
use crate::model::{NewSubmission, RowId, Submission};
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str = "id, location_key, asset_key, category_key, issue_key, comment, \
                       file_names, submitter, created_at";

/// Accessor for the `submissions` table.
pub struct Submissions<'c> {
    conn: &'c Connection,
}

impl<'c> Submissions<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Inserts a submission and returns its surrogate id.
    pub fn insert(&self, submission: &NewSubmission) -> StoreResult<RowId> {
        self.conn.execute(
            "INSERT INTO submissions \
             (location_key, asset_key, category_key, issue_key, comment, file_names, submitter, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                submission.location_key,
                submission.asset_key,
                submission.category_key,
                submission.issue_key,
                submission.comment,
                submission.file_names,
                submission.submitter,
                submission.created_at
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Finds a submission by surrogate id.
    pub fn find(&self, id: RowId) -> StoreResult<Option<Submission>> {
        let sql = format!("SELECT {COLUMNS} FROM submissions WHERE id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![id], from_row)
            .optional()?)
    }

    /// Returns every pending submission, oldest first.
    pub fn pending(&self) -> StoreResult<Vec<Submission>> {
        let sql = format!("SELECT {COLUMNS} FROM submissions ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Deletes a submission. Returns false if it was already gone.
    pub fn delete(&self, id: RowId) -> StoreResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM submissions WHERE id = ?1", params![id])?;
        Ok(changed > 0)
    }

    /// Returns the number of pending submissions.
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM submissions", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Submission> {
    Ok(Submission {
        id: row.get(0)?,
        location_key: row.get(1)?,
        asset_key: row.get(2)?,
        category_key: row.get(3)?,
        issue_key: row.get(4)?,
        comment: row.get(5)?,
        file_names: row.get(6)?,
        submitter: row.get(7)?,
        created_at: row.get(8)?,
    })
}
