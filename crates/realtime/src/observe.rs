use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Fan-out of an unbounded event sequence to any number of observers.
///
/// Observers only see events published after they subscribed. Dropped receivers are pruned on the next
/// publish.
#[derive(Debug)]
pub struct Observers<T> {
	senders: Arc<Mutex<Vec<mpsc::UnboundedSender<T>>>>,
}

impl<T: Clone> Observers<T> {
	#[must_use]
	pub fn subscribe(&self) -> UnboundedReceiverStream<T> {
		let (tx, rx) = mpsc::unbounded_channel();

		self.senders
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.push(tx);

		UnboundedReceiverStream::new(rx)
	}

	pub fn publish(&self, value: &T) {
		self.senders
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.retain(|tx| tx.send(value.clone()).is_ok());
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.senders
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.iter()
			.filter(|tx| !tx.is_closed())
			.count()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl<T> Default for Observers<T> {
	fn default() -> Self {
		Self {
			senders: Arc::default(),
		}
	}
}

impl<T> Clone for Observers<T> {
	fn clone(&self) -> Self {
		Self {
			senders: Arc::clone(&self.senders),
		}
	}
}
