//! Contract of the remote tier tree service.
//!
//! The server exposes four endpoints:
//!
//! - `GET lookup?name=<name>` → [`TierInfo`] or 404
//! - `GET tree?ids[]=<id>...` → [`TreeResponse`] or 404
//! - `POST newChild` with a [`NewChildInfo`] body → [`TreeResponse`] of the new child
//! - `GET open?name=<name>` → whether the server opened the tier's folder
//!
//! [`TreeService`] is the seam the engine talks through; transports implement it.
//! [`MemoryTreeService`] serves a fixture from memory for tests, demos and offline browsing.

use async_trait::async_trait;
use cassini_types::{NewChildInfo, TierInfo, TierPath, TreeResponse};

mod memory;

pub use memory::{MemoryTreeService, ProjectFixture, TreeFixture};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors reported by a tree service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The server answered 404 for the tier.
	#[error("not found: {0}")]
	NotFound(String),
	/// The server refused the request (bad identifier, duplicate child, ...).
	#[error("rejected: {0}")]
	Rejected(String),
	/// The request did not complete.
	#[error("transport error: {0}")]
	Transport(String),
	/// The response body could not be decoded.
	#[error("invalid response: {0}")]
	Decode(String),
}

impl From<serde_json::Error> for Error {
	fn from(e: serde_json::Error) -> Self {
		Self::Decode(e.to_string())
	}
}

/// Remote tier tree service.
///
/// Calls are plain request/response; retry policy, if any, belongs to implementations.
#[async_trait]
pub trait TreeService: Send + Sync {
	/// Resolve a tier name to its entity info.
	async fn lookup(&self, name: &str) -> Result<TierInfo>;

	/// Fetch the tree data of the tier at `ids`, including shallow child summaries.
	async fn tree(&self, ids: &TierPath) -> Result<TreeResponse>;

	/// Create a child tier, returning its tree data.
	async fn new_child(&self, info: &NewChildInfo) -> Result<TreeResponse>;

	/// Ask the server to open the tier's folder.
	async fn open(&self, name: &str) -> Result<bool>;
}
