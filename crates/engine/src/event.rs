use parking_lot::RwLock;
use tokio::sync::broadcast;

/// Broadcast stream of typed events.
///
/// Closing drops the sender: existing receivers drain what is buffered and then observe
/// [`broadcast::error::RecvError::Closed`]; later subscribers observe `Closed` immediately.
#[derive(Debug)]
pub struct EventStream<E> {
	tx: RwLock<Option<broadcast::Sender<E>>>,
}

impl<E: Clone> EventStream<E> {
	/// Create a stream buffering up to `capacity` events per receiver.
	pub fn new(capacity: usize) -> Self {
		let (tx, _) = broadcast::channel(capacity.max(1));
		Self {
			tx: RwLock::new(Some(tx)),
		}
	}

	/// Send an event to current subscribers, returning how many received it.
	pub fn emit(&self, event: E) -> usize {
		self.tx
			.read()
			.as_ref()
			.and_then(|tx| tx.send(event).ok())
			.unwrap_or(0)
	}

	/// Subscribe to events emitted from now on.
	pub fn subscribe(&self) -> broadcast::Receiver<E> {
		match self.tx.read().as_ref() {
			Some(tx) => tx.subscribe(),
			None => broadcast::channel(1).1,
		}
	}

	/// Close the stream. Idempotent.
	pub fn close(&self) {
		self.tx.write().take();
	}

	/// Whether [`Self::close`] was called.
	pub fn is_closed(&self) -> bool {
		self.tx.read().is_none()
	}

	/// Number of live subscribers.
	pub fn receiver_count(&self) -> usize {
		self.tx.read().as_ref().map_or(0, broadcast::Sender::receiver_count)
	}
}
