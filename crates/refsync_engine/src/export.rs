//! Pushes pending submissions to the remote side.
//!
//! Each pending submission goes through the states of [`SubmissionState`]:
//! its attachments are resolved and uploaded, one remote record is
//! submitted, and if the remote side confirmed the record the row is
//! queued for deletion. All accepted rows of a run are removed in one
//! transaction; their files are deleted only after that commit.

use crate::attachments::{parse_file_names, resolve_file};
use crate::decode::first_key;
use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, Utc};
use refsync_remote::RemoteClient;
use refsync_store::{RowId, Store, Submission, Tables};
use serde::Serialize;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Method creating a list element.
pub(crate) const SUBMIT_METHOD: &str = "lists.element.add";

/// Errors shown in the text rendering of a report.
const ERROR_PREVIEW: usize = 5;

/// Property codes of the exported record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFields {
    /// Creation date (`YYYY-MM-DD`).
    pub date: String,
    /// Asset external key.
    pub asset: String,
    /// Comment text.
    pub comment: String,
    /// Issue external key.
    pub issue: String,
    /// Uploaded attachments.
    pub files: String,
    /// Issue category external key.
    pub category: String,
    /// Location external key; omitted from the record when unset.
    pub location: Option<String>,
    /// Submitter messaging identity; omitted from the record when unset.
    pub submitter: Option<String>,
}

impl Default for ExportFields {
    fn default() -> Self {
        Self {
            date: "PROPERTY_1095".to_string(),
            asset: "PROPERTY_1101".to_string(),
            comment: "PROPERTY_1107".to_string(),
            issue: "PROPERTY_1109".to_string(),
            files: "PROPERTY_1111".to_string(),
            category: "PROPERTY_1123".to_string(),
            location: Some("PROPERTY_1097".to_string()),
            submitter: None,
        }
    }
}

/// Export settings.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Directory holding stored attachments.
    pub upload_dir: PathBuf,
    /// List type of the target list.
    pub list_type_id: String,
    /// Target list.
    pub list_id: String,
    /// `NAME` of every exported record.
    pub record_title: String,
    /// Maximum comment length in characters.
    pub comment_limit: usize,
    /// Property codes.
    pub fields: ExportFields,
}

impl ExportConfig {
    /// Creates the default configuration for attachments in `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            list_type_id: "bitrix_processes".to_string(),
            list_id: "125".to_string(),
            record_title: "Видеофиксация".to_string(),
            comment_limit: 500,
            fields: ExportFields::default(),
        }
    }

    /// Sets the target list.
    pub fn with_list(mut self, list_type_id: impl Into<String>, list_id: impl Into<String>) -> Self {
        self.list_type_id = list_type_id.into();
        self.list_id = list_id.into();
        self
    }

    /// Sets the property codes.
    pub fn with_fields(mut self, fields: ExportFields) -> Self {
        self.fields = fields;
        self
    }

    /// Sets the comment length limit.
    pub fn with_comment_limit(mut self, limit: usize) -> Self {
        self.comment_limit = limit;
        self
    }
}

/// Where a submission is in its export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    /// Read from the queue.
    Pending,
    /// Attachment names matched against stored files.
    FilesResolved,
    /// Attachments uploaded (failed uploads are omitted).
    FilesUploaded,
    /// Remote record submitted and confirmed.
    RemoteSubmitted,
    /// Row deleted locally.
    CommittedDelete,
    /// Row kept for the next run.
    LeftForRetry,
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionState::Pending => "pending",
            SubmissionState::FilesResolved => "files_resolved",
            SubmissionState::FilesUploaded => "files_uploaded",
            SubmissionState::RemoteSubmitted => "remote_submitted",
            SubmissionState::CommittedDelete => "committed_delete",
            SubmissionState::LeftForRetry => "left_for_retry",
        };
        f.write_str(name)
    }
}

fn transition(id: RowId, state: SubmissionState) {
    debug!(submission = id, state = %state, "Submission state");
}

/// Source of pending submissions.
pub trait SubmissionQueue: Send + Sync {
    /// Returns pending submissions in creation order.
    fn pending(&self) -> EngineResult<Vec<Submission>>;

    /// Removes `ids` in one transaction and returns how many were removed.
    fn remove(&self, ids: &[RowId]) -> EngineResult<u64>;
}

/// The submissions table of a [`Store`].
#[derive(Debug, Clone)]
pub struct StoreQueue {
    store: Store,
}

impl StoreQueue {
    /// Creates a queue over `store`.
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

impl SubmissionQueue for StoreQueue {
    fn pending(&self) -> EngineResult<Vec<Submission>> {
        let session = self.store.session()?;
        Ok(session.connection().submissions().pending()?)
    }

    fn remove(&self, ids: &[RowId]) -> EngineResult<u64> {
        self.store.transaction(|tx| {
            let mut removed = 0;
            for id in ids {
                if tx.submissions().delete(*id)? {
                    removed += 1;
                }
            }
            Ok::<_, EngineError>(removed)
        })
    }
}

/// The result of one export run.
#[derive(Debug, Clone, Serialize)]
pub struct ExportReport {
    /// Run identifier.
    pub run_id: Uuid,
    /// Start time.
    pub started_at: DateTime<Utc>,
    /// End time.
    pub finished_at: DateTime<Utc>,
    /// False if any error was recorded.
    pub success: bool,
    /// Submissions the remote side confirmed.
    pub exported: u64,
    /// Rows deleted locally.
    pub deleted: u64,
    /// Submissions left for the next run without an error.
    pub left_for_retry: u64,
    /// Errors, per submission or for the whole run.
    pub errors: Vec<String>,
}

impl ExportReport {
    fn new(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            started_at: now,
            finished_at: now,
            success: true,
            exported: 0,
            deleted: 0,
            left_for_retry: 0,
            errors: Vec::new(),
        }
    }

    fn finish(mut self) -> Self {
        self.success = self.errors.is_empty();
        self.finished_at = Utc::now();
        self
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = if self.success { "succeeded" } else { "failed" };
        writeln!(f, "Export run {} {status}", self.run_id)?;
        for error in self.errors.iter().take(ERROR_PREVIEW) {
            writeln!(f, "      - {error}")?;
        }
        if self.errors.len() > ERROR_PREVIEW {
            writeln!(f, "      ... and {} more", self.errors.len() - ERROR_PREVIEW)?;
        }
        write!(
            f,
            "  Total: exported {}, deleted {}, left for retry {}, errors {}",
            self.exported,
            self.deleted,
            self.left_for_retry,
            self.errors.len()
        )
    }
}

/// Returns the remote idempotency token of a submission.
///
/// The token depends only on the row id and creation time, so every
/// retry of the same row sends the same token.
pub fn idempotency_token(submission: &Submission) -> String {
    let digest = Sha256::digest(format!(
        "{}:{}",
        submission.id,
        submission.created_at.to_rfc3339()
    ));
    let hex: String = digest.iter().take(16).map(|b| format!("{b:02x}")).collect();
    format!("refsync-{hex}")
}

/// Exports pending submissions.
pub struct ExportPipeline {
    queue: Arc<dyn SubmissionQueue>,
    remote: RemoteClient,
    config: ExportConfig,
}

impl ExportPipeline {
    /// Creates a pipeline over the submissions table of `store`.
    pub fn new(store: Store, remote: RemoteClient, config: ExportConfig) -> Self {
        Self::with_queue(Arc::new(StoreQueue::new(store)), remote, config)
    }

    /// Creates a pipeline over an explicit queue.
    pub fn with_queue(
        queue: Arc<dyn SubmissionQueue>,
        remote: RemoteClient,
        config: ExportConfig,
    ) -> Self {
        Self {
            queue,
            remote,
            config,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ExportConfig {
        &self.config
    }

    /// Runs one export over every pending submission.
    pub fn run_export(&self) -> ExportReport {
        let run_id = Uuid::new_v4();
        let span = info_span!("export", run_id = %run_id);
        let _guard = span.enter();
        let mut report = ExportReport::new(run_id);

        let pending = match self.queue.pending() {
            Ok(pending) => pending,
            Err(e) => {
                error!(error = %e, "Cannot read pending submissions");
                report.errors.push(e.to_string());
                return report.finish();
            }
        };
        if pending.is_empty() {
            debug!("No pending submissions");
            return report.finish();
        }
        info!(count = pending.len(), "Exporting submissions");

        let mut accepted: Vec<(RowId, Vec<PathBuf>)> = Vec::new();
        let mut claimed = HashSet::new();
        for submission in &pending {
            match self.export_one(submission, &mut claimed) {
                Ok(Some(files)) => {
                    report.exported += 1;
                    accepted.push((submission.id, files));
                }
                Ok(None) => report.left_for_retry += 1,
                Err(e) => {
                    let message = format!("submission #{}: {e}", submission.id);
                    warn!("{message}");
                    report.errors.push(message);
                }
            }
        }

        if !accepted.is_empty() {
            let ids: Vec<RowId> = accepted.iter().map(|(id, _)| *id).collect();
            match self.queue.remove(&ids) {
                Ok(removed) => {
                    report.deleted = removed;
                    for (id, files) in &accepted {
                        transition(*id, SubmissionState::CommittedDelete);
                        delete_files(*id, files);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Removing exported submissions failed, rolled back");
                    report
                        .errors
                        .push(format!("removing exported submissions failed: {e}"));
                }
            }
        }

        let report = report.finish();
        info!(
            exported = report.exported,
            deleted = report.deleted,
            left_for_retry = report.left_for_retry,
            errors = report.errors.len(),
            "Export finished"
        );
        report
    }

    /// Exports one submission.
    ///
    /// Returns the stored files of a confirmed submission, `None` if the
    /// remote side has not confirmed it yet. Resolved files are added to
    /// `claimed` so later submissions of the run cannot take them.
    fn export_one(
        &self,
        submission: &Submission,
        claimed: &mut HashSet<PathBuf>,
    ) -> EngineResult<Option<Vec<PathBuf>>> {
        let id = submission.id;
        transition(id, SubmissionState::Pending);

        let names = submission
            .file_names
            .as_deref()
            .map(parse_file_names)
            .unwrap_or_default();
        let mut files = Vec::with_capacity(names.len());
        for name in &names {
            match resolve_file(&self.config.upload_dir, name, submission.created_at, claimed) {
                Some(path) => {
                    claimed.insert(path.clone());
                    files.push(path);
                }
                None => warn!(submission = id, file = %name, "Attachment not found, omitting"),
            }
        }
        transition(id, SubmissionState::FilesResolved);

        let mut file_ids = Vec::with_capacity(files.len());
        for path in &files {
            match self.remote.upload_file(path) {
                Ok(file_id) => file_ids.push(file_id),
                Err(e) => warn!(submission = id, path = ?path, error = %e, "Upload failed, omitting"),
            }
        }
        transition(id, SubmissionState::FilesUploaded);

        let record = self.build_record(submission, &file_ids);
        let confirmed = match self.remote.call(SUBMIT_METHOD, &record) {
            Ok(result) => match record_id(&result) {
                Some(record) => {
                    info!(submission = id, record, "Submission exported");
                    true
                }
                None => {
                    warn!(
                        submission = id,
                        age_secs = (Utc::now() - submission.created_at).num_seconds(),
                        response = %result,
                        "Remote returned no record id, leaving for retry"
                    );
                    false
                }
            },
            Err(e) if e.is_already_exists() => {
                info!(submission = id, "Record already exists remotely");
                true
            }
            Err(e) => return Err(e.into()),
        };

        if confirmed {
            transition(id, SubmissionState::RemoteSubmitted);
            Ok(Some(files))
        } else {
            transition(id, SubmissionState::LeftForRetry);
            Ok(None)
        }
    }

    fn build_record(&self, submission: &Submission, file_ids: &[i64]) -> Value {
        let names = &self.config.fields;
        let comment: String = submission
            .comment
            .as_deref()
            .unwrap_or_default()
            .chars()
            .take(self.config.comment_limit)
            .collect();

        let mut fields = Map::new();
        fields.insert("NAME".into(), json!(self.config.record_title));
        fields.insert(
            names.date.clone(),
            json!(submission.created_at.format("%Y-%m-%d").to_string()),
        );
        fields.insert(names.asset.clone(), json!(submission.asset_key.to_string()));
        fields.insert(names.comment.clone(), json!(comment));
        fields.insert(names.issue.clone(), json!(submission.issue_key.to_string()));
        fields.insert(
            names.category.clone(),
            json!(submission.category_key.to_string()),
        );
        if let Some(location) = &names.location {
            fields.insert(location.clone(), json!(submission.location_key.to_string()));
        }
        if let (Some(property), Some(submitter)) = (&names.submitter, &submission.submitter) {
            fields.insert(property.clone(), json!(submitter));
        }
        if !file_ids.is_empty() {
            let packed: Vec<String> = file_ids.iter().map(|id| format!("n{id}")).collect();
            fields.insert(names.files.clone(), json!({ "n0": packed }));
        }

        json!({
            "IBLOCK_TYPE_ID": self.config.list_type_id,
            "IBLOCK_ID": self.config.list_id,
            "ELEMENT_CODE": idempotency_token(submission),
            "FIELDS": fields,
        })
    }
}

impl fmt::Debug for ExportPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Reads a positive record id from a submit result.
fn record_id(result: &Value) -> Option<i64> {
    match result {
        Value::Object(map) => first_key(map.get("ID").or_else(|| map.get("id"))),
        other => first_key(Some(other)),
    }
}

fn delete_files(id: RowId, files: &[PathBuf]) {
    for path in files {
        match fs::remove_file(path) {
            Ok(()) => debug!(submission = id, path = ?path, "Deleted attachment"),
            Err(e) => warn!(submission = id, path = ?path, error = %e, "Cannot delete attachment"),
        }
    }
}
