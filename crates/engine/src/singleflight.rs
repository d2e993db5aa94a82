//! Request coalescing by key.
//!
//! The first caller for a key becomes the leader and runs the work; callers arriving while it
//! runs wait on a `watch` channel for the leader's result. If the leader is dropped before
//! publishing, its guard removes the entry and waiters observe `None`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

type InflightMap<K, V> = Arc<Mutex<HashMap<K, watch::Sender<Option<V>>>>>;

/// Keyed singleflight group.
pub(crate) struct Singleflight<K, V> {
	inflight: InflightMap<K, V>,
}

impl<K, V> Default for Singleflight<K, V> {
	fn default() -> Self {
		Self {
			inflight: Arc::new(Mutex::new(HashMap::new())),
		}
	}
}

impl<K, V> Singleflight<K, V>
where
	K: Eq + Hash + Clone,
	V: Clone,
{
	/// Run `work` for `key`, or wait for the leader already running it.
	///
	/// Returns `None` if the leader was dropped before producing a value.
	pub(crate) async fn run<F>(&self, key: K, work: F) -> Option<V>
	where
		F: Future<Output = V>,
	{
		let existing = {
			let mut map = self.inflight.lock();
			match map.get(&key) {
				Some(tx) => Some(tx.subscribe()),
				None => {
					map.insert(key.clone(), watch::channel(None).0);
					None
				}
			}
		};

		let Some(mut rx) = existing else {
			let guard = FlightGuard {
				key,
				inflight: Arc::clone(&self.inflight),
				completed: false,
			};
			return Some(guard.complete(work.await));
		};

		loop {
			if let Some(value) = rx.borrow_and_update().as_ref() {
				return Some(value.clone());
			}
			rx.changed().await.ok()?;
		}
	}

	/// Number of keys with a leader running.
	#[cfg(test)]
	pub(crate) fn len(&self) -> usize {
		self.inflight.lock().len()
	}
}

/// Leader side of one flight; unregisters the key when done or dropped.
struct FlightGuard<K: Eq + Hash, V> {
	key: K,
	inflight: InflightMap<K, V>,
	completed: bool,
}

impl<K: Eq + Hash, V: Clone> FlightGuard<K, V> {
	fn complete(mut self, value: V) -> V {
		self.completed = true;
		if let Some(tx) = self.inflight.lock().remove(&self.key) {
			tx.send_replace(Some(value.clone()));
		}
		value
	}
}

impl<K: Eq + Hash, V> Drop for FlightGuard<K, V> {
	fn drop(&mut self) {
		if self.completed {
			return;
		}
		// Dropping the sender wakes waiters with a closed channel.
		self.inflight.lock().remove(&self.key);
	}
}

#[cfg(test)]
mod tests {
	use std::sync::atomic::{AtomicUsize, Ordering};
	use std::time::Duration;

	use tokio::sync::Notify;

	use super::*;

	#[tokio::test]
	async fn test_waiters_share_leader_result() {
		let group = Arc::new(Singleflight::<u32, usize>::default());
		let calls = Arc::new(AtomicUsize::new(0));
		let release = Arc::new(Notify::new());

		let spawn = |group: Arc<Singleflight<u32, usize>>| {
			let calls = Arc::clone(&calls);
			let release = Arc::clone(&release);
			tokio::spawn(async move {
				group
					.run(7, async move {
						release.notified().await;
						calls.fetch_add(1, Ordering::SeqCst) + 10
					})
					.await
			})
		};

		let leader = spawn(Arc::clone(&group));
		tokio::time::sleep(Duration::from_millis(10)).await;
		let waiter = spawn(Arc::clone(&group));
		tokio::time::sleep(Duration::from_millis(10)).await;
		assert_eq!(group.len(), 1);

		release.notify_one();
		assert_eq!(leader.await.unwrap(), Some(10));
		assert_eq!(waiter.await.unwrap(), Some(10));
		assert_eq!(calls.load(Ordering::SeqCst), 1);
		assert_eq!(group.len(), 0);
	}

	#[tokio::test]
	async fn test_cancelled_leader_releases_waiters() {
		let group = Arc::new(Singleflight::<u32, usize>::default());

		let leader = tokio::spawn({
			let group = Arc::clone(&group);
			async move { group.run(1, std::future::pending()).await }
		});
		tokio::time::sleep(Duration::from_millis(10)).await;
		let waiter = tokio::spawn({
			let group = Arc::clone(&group);
			async move { group.run(1, async { 5 }).await }
		});
		tokio::time::sleep(Duration::from_millis(10)).await;

		leader.abort();
		assert_eq!(waiter.await.unwrap(), None);
		assert_eq!(group.len(), 0);

		assert_eq!(group.run(1, async { 6 }).await, Some(6));
	}
}
