//! Typed table accessors.
//!
//! Accessors borrow a connection, so they work the same on a plain
//! session connection and inside a transaction or savepoint.

mod assets;
mod categories;
mod issues;
mod locations;
mod operators;
mod submissions;

pub use assets::Assets;
pub use categories::IssueCategories;
pub use issues::Issues;
pub use locations::Locations;
pub use operators::Operators;
pub use submissions::Submissions;

use rusqlite::Connection;

/// Entry point to the typed accessors of every table.
pub trait Tables {
    /// Locations table.
    fn locations(&self) -> Locations<'_>;
    /// Assets table.
    fn assets(&self) -> Assets<'_>;
    /// Issue categories table.
    fn categories(&self) -> IssueCategories<'_>;
    /// Issues table.
    fn issues(&self) -> Issues<'_>;
    /// Operators table.
    fn operators(&self) -> Operators<'_>;
    /// Pending submissions table.
    fn submissions(&self) -> Submissions<'_>;
}

impl Tables for Connection {
    fn locations(&self) -> Locations<'_> {
        Locations::new(self)
    }

    fn assets(&self) -> Assets<'_> {
        Assets::new(self)
    }

    fn categories(&self) -> IssueCategories<'_> {
        IssueCategories::new(self)
    }

    fn issues(&self) -> Issues<'_> {
        Issues::new(self)
    }

    fn operators(&self) -> Operators<'_> {
        Operators::new(self)
    }

    fn submissions(&self) -> Submissions<'_> {
        Submissions::new(self)
    }
}

/// Maps "no rows changed" to [`crate::StoreError::NotFound`].
fn expect_changed(changed: usize, table: &'static str, id: i64) -> crate::StoreResult<()> {
    if changed == 0 {
        Err(crate::StoreError::NotFound { table, id })
    } else {
        Ok(())
    }
}
