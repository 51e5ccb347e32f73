use super::expect_changed;
use crate::error::StoreResult;
use crate::model::{ExternalKey, NewOperator, Operator, RowId};
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension, Row};

const COLUMNS: &str =
    "id, first_name, last_name, messaging_id, secret, external_key, created_at, updated_at";

/// Length of a generated operator secret.
const SECRET_LEN: usize = 32;

/// Accessor for the `operators` table.
///
/// There is deliberately no way to change an operator's messaging
/// identity or secret through this accessor.
pub struct Operators<'c> {
    conn: &'c Connection,
}

impl<'c> Operators<'c> {
    pub(crate) fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }

    /// Finds the operator holding `key`.
    pub fn find_by_external_key(&self, key: ExternalKey) -> StoreResult<Option<Operator>> {
        let sql = format!("SELECT {COLUMNS} FROM operators WHERE external_key = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![key], from_row)
            .optional()?)
    }

    /// Finds an operator by full name, preferring unlinked rows.
    pub fn find_by_full_name(
        &self,
        first_name: &str,
        last_name: &str,
    ) -> StoreResult<Option<Operator>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM operators WHERE first_name = ?1 AND last_name = ?2 \
             ORDER BY external_key IS NOT NULL, id LIMIT 1"
        );
        Ok(self
            .conn
            .query_row(&sql, params![first_name, last_name], from_row)
            .optional()?)
    }

    /// Finds an operator by messaging identity.
    pub fn find_by_messaging_id(&self, messaging_id: &str) -> StoreResult<Option<Operator>> {
        let sql = format!("SELECT {COLUMNS} FROM operators WHERE messaging_id = ?1");
        Ok(self
            .conn
            .query_row(&sql, params![messaging_id], from_row)
            .optional()?)
    }

    /// Inserts an operator with a freshly generated secret.
    pub fn insert(&self, operator: &NewOperator) -> StoreResult<Operator> {
        let now = Utc::now();
        let secret = generate_secret();
        self.conn.execute(
            "INSERT INTO operators \
             (first_name, last_name, messaging_id, secret, external_key, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?5)",
            params![
                operator.first_name,
                operator.last_name,
                operator.messaging_id,
                secret,
                now
            ],
        )?;

        Ok(Operator {
            id: self.conn.last_insert_rowid(),
            first_name: operator.first_name.clone(),
            last_name: operator.last_name.clone(),
            messaging_id: operator.messaging_id.clone(),
            secret,
            external_key: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Updates the remotely owned profile fields of an operator.
    pub fn update_profile(
        &self,
        id: RowId,
        first_name: &str,
        last_name: &str,
        external_key: Option<ExternalKey>,
    ) -> StoreResult<()> {
        let changed = self.conn.execute(
            "UPDATE operators SET first_name = ?2, last_name = ?3, external_key = ?4, \
             updated_at = ?5 WHERE id = ?1",
            params![id, first_name, last_name, external_key, Utc::now()],
        )?;
        expect_changed(changed, "operators", id)
    }

    /// Returns all operators ordered by surrogate id.
    pub fn list(&self) -> StoreResult<Vec<Operator>> {
        let sql = format!("SELECT {COLUMNS} FROM operators ORDER BY id");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], from_row)?;
        Ok(rows.collect::<Result<_, _>>()?)
    }

    /// Returns the number of operators.
    pub fn count(&self) -> StoreResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM operators", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

/// Generates a random alphanumeric operator secret.
fn generate_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SECRET_LEN)
        .map(char::from)
        .collect()
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Operator> {
    Ok(Operator {
        id: row.get(0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        messaging_id: row.get(3)?,
        secret: row.get(4)?,
        external_key: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_secret_shape() {
        let secret = generate_secret();
        assert_eq!(secret.len(), SECRET_LEN);
        assert!(secret.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(secret, generate_secret());
    }
}
