//! Core data model for the sync-testkit client.
//!
//! This crate provides the types shared by every other testkit crate:
//!
//! - [`ClusterMode`] - Indexing strategy of the server under test
//! - [`SequenceToken`] - Typed changes-feed cursor (plain or compound)
//! - [`ChangesEntry`] / [`ChangesFeed`] - Parsed `_changes` responses
//! - [`DocumentCache`] - A principal's local record of what it wrote
//!
//! # Architecture
//!
//! ```text
//! testkit-types (this crate)
//!    │
//!    ├─── testkit-config     (discovers the ClusterMode)
//!    ├─── testkit-client     (returns raw feeds parsed by this crate)
//!    ├─── testkit-principal  (owns DocumentCaches, tracks ChangesEntries)
//!    └─── testkit-verify     (compares feeds against caches)
//! ```
//!
//! # Example
//!
//! ```rust
//! use testkit_types::{ClusterMode, SequenceToken};
//!
//! let token = SequenceToken::parse_for_mode("1a2b::17", ClusterMode::DistributedIndex).unwrap();
//! assert_eq!(token.components(), Some(("1a2b", 17)));
//!
//! assert!(SequenceToken::parse_for_mode("1a2b::17", ClusterMode::ChannelCache).is_err());
//! ```

pub mod cache;
pub mod changes;
pub mod mode;
pub mod revision;
pub mod sequence;

pub use cache::{CachedDocument, DocumentCache};
pub use changes::{
    check_compound_ordering, ChangesEntry, ChangesFeed, ChangesLine, FeedParseError,
    RawChangesEntry, RawChangesResponse,
};
pub use mode::ClusterMode;
pub use revision::{is_principal_doc, revision_generation, PRINCIPAL_DOC_PREFIX};
pub use sequence::{SequenceError, SequenceToken};
