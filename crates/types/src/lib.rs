//! Shared types for the tier tree.
//!
//! A tier is one entity of a project (the home folder, a work package, an experiment, ...). Tiers
//! form a tree addressed by [`TierPath`]s. The remote tree service speaks the wire types in
//! [`wire`]; the cache stores the converted [`TreeNode`]/[`ChildSummary`] forms from [`tree`].

/// Identifier chains locating tiers in the tree.
pub mod path;
/// Metadata schemas and their `x-cas-field` tags.
pub mod schema;
/// `started` timestamp conversion between the wire and the data model.
pub mod time;
/// Converted tree data held by the cache.
pub mod tree;
/// Wire formats of the remote tree service.
pub mod wire;

pub use path::TierPath;
pub use schema::{FieldTag, MetaSchema};
pub use tree::{ChildSummary, TreeNode};
pub use wire::{
	ChildClsFolderInfo, ChildClsInfo, ChildClsNotebookInfo, FolderTierInfo, NewChildInfo,
	NotebookTierInfo, TierInfo, TierKind, TreeChildResponse, TreeResponse,
};

/// Metadata document type: a JSON object.
pub type MetaMap = serde_json::Map<String, serde_json::Value>;

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while converting or validating tier data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// A `started` value is not an ISO-8601 timestamp.
	#[error("invalid timestamp {value:?}: {reason}")]
	Timestamp {
		/// The offending wire value.
		value: String,
		/// Parser message.
		reason: String,
	},
	/// A child class `idRegex` does not compile.
	#[error("invalid id pattern {pattern:?}: {reason}")]
	IdPattern {
		/// The pattern as sent by the server.
		pattern: String,
		/// Regex compiler message.
		reason: String,
	},
	/// A proposed child identifier is rejected.
	#[error("invalid child id {id:?}: {reason}")]
	ChildId {
		/// The proposed identifier.
		id: String,
		/// Why it was rejected.
		reason: &'static str,
	},
}
