//! # refsync testkit
//!
//! Test utilities for refsync.
//!
//! This crate provides:
//! - Temp-dir backed stores and attachment directories
//! - A mock-backed remote client with retry delays disabled
//! - Builders for remote payloads (field dictionaries, list elements, users)
//! - Property-based generators for the polymorphic wire shapes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use refsync_testkit::prelude::*;
//!
//! #[test]
//! fn reconciles_locations() {
//!     let store = TestStore::new();
//!     let remote = TestRemote::new();
//!     remote.mock.respond_result("lists.field.get", field_dictionary("PROPERTY_637", 77, &[("5", "North")]));
//!     // ...
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod payloads;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::payloads::*;
}

pub use fixtures::*;
pub use generators::*;
pub use payloads::*;
