//! Test fixtures: stores, remotes and attachment directories.
//!
//! Fixtures panic on setup failure; they are only meant for tests.

use chrono::{DateTime, TimeZone, Utc};
use refsync_remote::{MockHttpClient, RemoteClient, RemoteConfig, RetryConfig};
use refsync_store::{
    ExternalKey, NewIssueCategory, NewLocation, NewOperator, NewSubmission, Operator, RowId,
    Store, StoreConfig, StoreError, Tables,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// A store backed by a database file in a temporary directory.
pub struct TestStore {
    /// The store instance.
    pub store: Store,
    /// The temporary directory (kept alive to prevent cleanup).
    dir: TempDir,
}

impl TestStore {
    /// Creates a fresh store with all tables bootstrapped.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let store = Store::open(StoreConfig::new(dir.path().join("refsync.db")))
            .expect("Failed to open test store");
        Self { store, dir }
    }

    /// Returns the database file path.
    pub fn path(&self) -> PathBuf {
        self.dir.path().join("refsync.db")
    }

    /// Inserts a location.
    pub fn add_location(&self, name: &str, key: Option<ExternalKey>) -> RowId {
        self.store
            .transaction(|tx| {
                tx.locations().insert(&NewLocation {
                    name: name.into(),
                    external_key: key,
                })
            })
            .expect("Failed to insert location")
    }

    /// Inserts an issue category.
    pub fn add_category(&self, name: &str, key: Option<ExternalKey>) -> RowId {
        self.store
            .transaction(|tx| {
                tx.categories().insert(&NewIssueCategory {
                    name: name.into(),
                    external_key: key,
                })
            })
            .expect("Failed to insert category")
    }

    /// Inserts an operator.
    pub fn add_operator(&self, first_name: &str, last_name: &str, messaging_id: &str) -> Operator {
        self.store
            .transaction(|tx| {
                tx.operators().insert(&NewOperator {
                    first_name: first_name.into(),
                    last_name: last_name.into(),
                    messaging_id: messaging_id.into(),
                })
            })
            .expect("Failed to insert operator")
    }

    /// Inserts a pending submission.
    pub fn add_submission(&self, submission: &NewSubmission) -> RowId {
        self.store
            .transaction(|tx| tx.submissions().insert(submission))
            .expect("Failed to insert submission")
    }

    /// Runs a read-only closure against a fresh session.
    pub fn read<T>(&self, f: impl FnOnce(&refsync_store::Connection) -> Result<T, StoreError>) -> T {
        let session = self.store.session().expect("Failed to open session");
        f(session.connection()).expect("Read failed")
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStore {
    type Target = Store;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}

/// A remote client wired to a [`MockHttpClient`].
///
/// Retries keep their attempt count but wait zero time between attempts,
/// and pagination does not sleep between pages.
pub struct TestRemote {
    /// The scripted HTTP client.
    pub mock: Arc<MockHttpClient>,
    /// A client that talks to `mock`.
    pub client: RemoteClient,
}

impl TestRemote {
    /// Creates a remote with no scripted routes.
    pub fn new() -> Self {
        let mock = Arc::new(MockHttpClient::new());
        let client = RemoteClient::new(fast_config(), mock.clone());
        Self { mock, client }
    }
}

impl Default for TestRemote {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns a remote configuration with all delays disabled.
pub fn fast_config() -> RemoteConfig {
    RemoteConfig::new("https://crm.test/rest/1/token")
        .with_retry(RetryConfig::new(3).with_base_delay(Duration::ZERO))
        .with_page_delay(Duration::ZERO)
}

/// A temporary attachment directory.
pub struct UploadDir {
    dir: TempDir,
}

impl UploadDir {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create upload directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a file and returns its path.
    pub fn create(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.dir.path().join(name);
        std::fs::write(&path, contents).expect("Failed to write upload");
        path
    }

    /// Returns true if `name` exists in the directory.
    pub fn contains(&self, name: &str) -> bool {
        self.dir.path().join(name).is_file()
    }
}

impl Default for UploadDir {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed creation time used by [`submission`].
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 11, 14, 22, 13, 20)
        .single()
        .expect("valid timestamp")
}

/// Builds a submission referencing the given external keys.
pub fn submission(
    location_key: ExternalKey,
    asset_key: ExternalKey,
    category_key: ExternalKey,
    issue_key: ExternalKey,
) -> NewSubmission {
    NewSubmission {
        location_key,
        asset_key,
        category_key,
        issue_key,
        comment: None,
        file_names: None,
        submitter: None,
        created_at: fixed_time(),
    }
}
