use std::{
	sync::{Arc, Mutex, MutexGuard, PoisonError},
	time::Duration,
};

use tokio::{spawn, sync::watch, task::JoinHandle, time::sleep};
use tracing::{debug, trace};

use crate::{config::NotifierConfig, types::UserId};

/// A freshly created match, shown once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchEvent {
	pub peer: UserId,
	pub name: String,
}

#[derive(Debug, Default)]
struct Overlay {
	generation: u64,
	hide: Option<JoinHandle<()>>,
}

#[derive(Debug)]
struct Inner {
	visible_for: Duration,
	state_tx: watch::Sender<Option<MatchEvent>>,
	overlay: Mutex<Overlay>,
}

/// Transient "it's a match" overlay. Each trigger shows the overlay and restarts the hide timer.
#[derive(Debug, Clone)]
pub struct MatchNotifier {
	inner: Arc<Inner>,
}

impl MatchNotifier {
	#[must_use]
	pub fn new(config: NotifierConfig) -> Self {
		let (state_tx, _) = watch::channel(None);

		Self {
			inner: Arc::new(Inner {
				visible_for: config.visible_for(),
				state_tx,
				overlay: Mutex::default(),
			}),
		}
	}

	pub fn trigger(&self, event: MatchEvent) {
		let mut overlay = self.lock_overlay();

		if let Some(hide) = overlay.hide.take() {
			hide.abort();
		}

		overlay.generation += 1;
		let generation = overlay.generation;

		debug!(peer = %event.peer, "Showing match overlay;");
		self.inner.state_tx.send_replace(Some(event));

		let inner = Arc::clone(&self.inner);
		overlay.hide = Some(spawn(async move {
			sleep(inner.visible_for).await;

			let mut overlay = inner.overlay.lock().unwrap_or_else(PoisonError::into_inner);
			// A newer trigger owns the overlay now
			if overlay.generation == generation {
				overlay.hide = None;
				inner.state_tx.send_replace(None);
				trace!("Match overlay hidden;");
			}
		}));
	}

	/// Hides the overlay immediately and cancels the pending hide timer.
	pub fn stop(&self) {
		let mut overlay = self.lock_overlay();

		overlay.generation += 1;
		if let Some(hide) = overlay.hide.take() {
			hide.abort();
		}

		self.inner.state_tx.send_replace(None);
	}

	#[must_use]
	pub fn is_visible(&self) -> bool {
		self.inner.state_tx.borrow().is_some()
	}

	#[must_use]
	pub fn current(&self) -> Option<MatchEvent> {
		self.inner.state_tx.borrow().clone()
	}

	/// Overlay state; `None` while hidden.
	#[must_use]
	pub fn subscribe(&self) -> watch::Receiver<Option<MatchEvent>> {
		self.inner.state_tx.subscribe()
	}

	fn lock_overlay(&self) -> MutexGuard<'_, Overlay> {
		self.inner
			.overlay
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}
}
