//! Entity types stored locally.
//!
//! Every reference entity carries a locally generated surrogate id and an
//! optional external key. The surrogate id never leaves the local store;
//! the external key is the remote system's identifier and the join key
//! used by reconciliation.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Locally generated surrogate identifier.
pub type RowId = i64;

/// Identifier assigned by the remote system.
pub type ExternalKey = i64;

/// A location (the parent of assets).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    /// Surrogate id.
    pub id: RowId,
    /// Display name, unique locally.
    pub name: String,
    /// Remote identifier, if known.
    pub external_key: Option<ExternalKey>,
}

/// A location that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLocation {
    /// Display name.
    pub name: String,
    /// Remote identifier, if known.
    pub external_key: Option<ExternalKey>,
}

/// An asset owned by a location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Asset {
    /// Surrogate id.
    pub id: RowId,
    /// Surrogate id of the owning location.
    pub location_id: RowId,
    /// Display name.
    pub name: String,
    /// Remote identifier, if known.
    pub external_key: Option<ExternalKey>,
    /// Free-text status label.
    pub status: Option<String>,
}

/// An asset that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    /// Surrogate id of the owning location.
    pub location_id: RowId,
    /// Display name.
    pub name: String,
    /// Remote identifier, if known.
    pub external_key: Option<ExternalKey>,
    /// Free-text status label.
    pub status: Option<String>,
}

/// A category of issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IssueCategory {
    /// Surrogate id.
    pub id: RowId,
    /// Display name, unique locally.
    pub name: String,
    /// Remote identifier, if known.
    pub external_key: Option<ExternalKey>,
}

/// An issue category that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssueCategory {
    /// Display name.
    pub name: String,
    /// Remote identifier, if known.
    pub external_key: Option<ExternalKey>,
}

/// An issue type owned by a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    /// Surrogate id.
    pub id: RowId,
    /// Surrogate id of the owning category.
    pub category_id: RowId,
    /// Display name.
    pub name: String,
    /// Remote identifier, if known.
    pub external_key: Option<ExternalKey>,
    /// Free-text status label.
    pub status: Option<String>,
}

/// An issue that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    /// Surrogate id of the owning category.
    pub category_id: RowId,
    /// Display name.
    pub name: String,
    /// Remote identifier, if known.
    pub external_key: Option<ExternalKey>,
    /// Free-text status label.
    pub status: Option<String>,
}

/// A field operator.
///
/// Operators are created by the intake surface, never by reconciliation:
/// creation needs a messaging identity and a secret that the remote feed
/// does not carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operator {
    /// Surrogate id.
    pub id: RowId,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Messaging identity, unique and immutable.
    pub messaging_id: String,
    /// Locally generated secret credential.
    pub secret: String,
    /// Remote identifier, populated by reconciliation only.
    pub external_key: Option<ExternalKey>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last profile update.
    pub updated_at: DateTime<Utc>,
}

/// An operator that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOperator {
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Messaging identity.
    pub messaging_id: String,
}

/// A locally collected submission waiting for export.
///
/// Parent references are external keys: submissions are created against
/// values end users already saw, which are external-key scoped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Surrogate id.
    pub id: RowId,
    /// External key of the location.
    pub location_key: ExternalKey,
    /// External key of the asset.
    pub asset_key: ExternalKey,
    /// External key of the issue category.
    pub category_key: ExternalKey,
    /// External key of the issue.
    pub issue_key: ExternalKey,
    /// Free-text comment.
    pub comment: Option<String>,
    /// Persisted attachment names: a bare name or a JSON array of names.
    pub file_names: Option<String>,
    /// Messaging identity of the submitter.
    pub submitter: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A submission that has not been inserted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubmission {
    /// External key of the location.
    pub location_key: ExternalKey,
    /// External key of the asset.
    pub asset_key: ExternalKey,
    /// External key of the issue category.
    pub category_key: ExternalKey,
    /// External key of the issue.
    pub issue_key: ExternalKey,
    /// Free-text comment.
    pub comment: Option<String>,
    /// Persisted attachment names: a bare name or a JSON array of names.
    pub file_names: Option<String>,
    /// Messaging identity of the submitter.
    pub submitter: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}
