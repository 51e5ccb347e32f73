//! # refsync store
//!
//! Local relational store for refsync.
//!
//! This crate provides:
//! - Entity types for reference data (locations, assets, issue categories,
//!   issues, operators) and pending submissions
//! - A session factory ([`Store`]) handing out one connection per session
//! - Closure-scoped transactions and per-item savepoints
//! - Typed table accessors over any connection or transaction
//!
//! ## Key Invariants
//!
//! - An external key is unique per entity type when present
//! - Child rows (assets, issues) always reference an existing parent row
//! - An operator's messaging identity never changes once stored
//! - Sessions are never shared between threads; each caller opens its own

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod model;
mod schema;
mod store;
mod tables;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use model::{
    Asset, ExternalKey, Issue, IssueCategory, Location, NewAsset, NewIssue, NewIssueCategory,
    NewLocation, NewOperator, NewSubmission, Operator, RowId, Submission,
};
pub use store::{with_savepoint, Session, Store};
pub use tables::{Assets, IssueCategories, Issues, Locations, Operators, Submissions, Tables};

/// Re-exported so callers can name transaction and connection types.
pub use rusqlite::{Connection, Transaction};
