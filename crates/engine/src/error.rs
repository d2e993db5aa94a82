/// A convenient type alias for `Result` with `E` = [`enum@crate::Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the engine.
///
/// `Clone` so one singleflight result can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
	/// The remote tree service failed.
	#[error(transparent)]
	Remote(#[from] cassini_remote::Error),
	/// A document backend or buffer failed.
	#[error(transparent)]
	Document(#[from] cassini_documents::Error),
	/// Tier data could not be converted or validated.
	#[error(transparent)]
	Types(#[from] cassini_types::Error),
	/// A tier's meta schema does not compile.
	#[error("invalid meta schema for {name}: {message}")]
	Schema {
		/// Tier name.
		name: String,
		/// Compiler message.
		message: String,
	},
	/// The model was disposed.
	#[error("model disposed: {0}")]
	Disposed(String),
	/// Configuration could not be loaded.
	#[error("configuration error: {0}")]
	Config(String),
	/// A request did not finish in time.
	#[error("request timed out: {0}")]
	Timeout(String),
	/// A shared request ended without a result.
	#[error("protocol error: {0}")]
	Protocol(String),
}
