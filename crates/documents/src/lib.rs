//! Structured documents backing tier models.
//!
//! A [`DocumentBackend`] reads and writes text documents addressed by project-relative paths.
//! A [`DocumentBuffer`] holds one JSON document in memory on top of a backend, tracks whether it
//! diverged from disk, and reports what each mutation changed as [`BufferChange`] flags.

mod backend;
mod buffer;

pub use backend::{DocumentBackend, FsBackend, MemoryBackend};
pub use buffer::{BufferChange, DocumentBuffer};

/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised by backends and buffers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// No document exists at the path.
	#[error("document not found: {0}")]
	NotFound(String),
	/// The path escapes the backend root or is otherwise unusable.
	#[error("invalid document path: {0}")]
	InvalidPath(String),
	/// Reading or writing failed.
	#[error("i/o error on {path}: {message}")]
	Io {
		/// Document path.
		path: String,
		/// Underlying error message.
		message: String,
	},
	/// The document is not valid JSON.
	#[error("failed to parse {path}: {message}")]
	Parse {
		/// Document path.
		path: String,
		/// Parser message.
		message: String,
	},
	/// The buffer was disposed.
	#[error("document buffer disposed: {0}")]
	Disposed(String),
}
