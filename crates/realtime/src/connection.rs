use std::{
	fmt,
	pin::pin,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, Mutex, PoisonError,
	},
};

use futures::{stream, FutureExt, StreamExt};
use futures_concurrency::stream::Merge;
use tokio::{
	spawn,
	sync::{mpsc, watch},
	time::{interval_at, Instant, MissedTickBehavior},
};
use tokio_stream::wrappers::{IntervalStream, UnboundedReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{
	collaborators::{Link, Transport},
	config::KeepaliveConfig,
	envelope::Envelope,
	error::TransportError,
	observe::Observers,
	types::UserId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
	#[default]
	Disconnected,
	Connecting,
	Connected,
}

impl ConnectionState {
	#[must_use]
	pub const fn is_connected(self) -> bool {
		matches!(self, Self::Connected)
	}
}

/// Identifies one established stream. Every successful (re)connection gets a fresh one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkId(u64);

impl fmt::Display for LinkId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "link#{}", self.0)
	}
}

struct ActiveLink {
	id: LinkId,
	identity: UserId,
	outbound: mpsc::UnboundedSender<String>,
	stop: CancellationToken,
}

struct Inner {
	transport: Arc<dyn Transport>,
	keepalive: KeepaliveConfig,
	state_tx: watch::Sender<ConnectionState>,
	inbound: Observers<Envelope>,
	active: Mutex<Option<ActiveLink>>,
	// Serializes connect/disconnect so a teardown never races an establishment
	lifecycle: tokio::sync::Mutex<()>,
	link_ids: AtomicU64,
}

/// Owns the single live stream of the local identity.
///
/// Cloning is cheap and every clone drives the same stream.
#[derive(Clone)]
pub struct ConnectionManager {
	inner: Arc<Inner>,
}

impl fmt::Debug for ConnectionManager {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ConnectionManager")
			.field("state", &*self.inner.state_tx.borrow())
			.field("link", &self.link_id())
			.finish()
	}
}

impl ConnectionManager {
	#[must_use]
	pub fn new(transport: Arc<dyn Transport>, keepalive: KeepaliveConfig) -> Self {
		let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

		Self {
			inner: Arc::new(Inner {
				transport,
				keepalive,
				state_tx,
				inbound: Observers::default(),
				active: Mutex::new(None),
				lifecycle: tokio::sync::Mutex::new(()),
				link_ids: AtomicU64::new(0),
			}),
		}
	}

	/// Opens the stream for `identity`, reusing it when it is already open for the same identity.
	/// A stream bound to another identity is torn down first.
	#[instrument(skip(self), err)]
	pub async fn connect(&self, identity: UserId) -> Result<LinkId, TransportError> {
		let _lifecycle = self.inner.lifecycle.lock().await;

		if let Some(id) = self.inner.reusable(identity) {
			trace!(%id, "Stream already open for this identity;");
			return Ok(id);
		}

		self.inner.teardown();
		self.inner.state_tx.send_replace(ConnectionState::Connecting);

		let Link { outbound, inbound } = match self.inner.transport.open(identity).await {
			Ok(link) => link,
			Err(e) => {
				warn!(?e, "Failed to open live stream;");
				self.inner
					.state_tx
					.send_replace(ConnectionState::Disconnected);
				return Err(e);
			}
		};

		let id = LinkId(self.inner.link_ids.fetch_add(1, Ordering::Relaxed) + 1);
		let stop = CancellationToken::new();

		// Installed before the runner starts, so an immediate remote close always finds its link
		*self.inner.lock_active() = Some(ActiveLink {
			id,
			identity,
			outbound: outbound.clone(),
			stop: stop.clone(),
		});
		self.inner.state_tx.send_replace(ConnectionState::Connected);

		spawn(run_link(
			Arc::clone(&self.inner),
			id,
			inbound,
			outbound,
			stop,
		));

		debug!(%id, "Live stream established;");

		Ok(id)
	}

	/// Closes the stream. Safe to call at any time, any number of times.
	#[instrument(skip(self))]
	pub async fn disconnect(&self) {
		let _lifecycle = self.inner.lifecycle.lock().await;
		self.inner.teardown();
		self.inner
			.state_tx
			.send_replace(ConnectionState::Disconnected);
	}

	/// Hands `envelope` to the transport. Returns `false` when there is no open stream, in which case
	/// the envelope is dropped.
	pub fn send(&self, envelope: &Envelope) -> bool {
		let active = self.inner.lock_active();

		match active.as_ref() {
			Some(link) => link.outbound.send(envelope.encode()).is_ok(),
			None => {
				trace!("Dropping outbound envelope, not connected;");
				false
			}
		}
	}

	/// Connectivity signal; new receivers observe the latest state immediately.
	#[must_use]
	pub fn connectivity(&self) -> watch::Receiver<ConnectionState> {
		self.inner.state_tx.subscribe()
	}

	#[must_use]
	pub fn state(&self) -> ConnectionState {
		*self.inner.state_tx.borrow()
	}

	#[must_use]
	pub fn is_connected(&self) -> bool {
		self.state().is_connected()
	}

	/// Every well-formed envelope received from now on, across reconnections.
	#[must_use]
	pub fn inbound(&self) -> UnboundedReceiverStream<Envelope> {
		self.inner.inbound.subscribe()
	}

	#[must_use]
	pub fn identity(&self) -> Option<UserId> {
		self.inner.lock_active().as_ref().map(|link| link.identity)
	}

	#[must_use]
	pub fn link_id(&self) -> Option<LinkId> {
		self.inner.lock_active().as_ref().map(|link| link.id)
	}
}

impl Inner {
	fn lock_active(&self) -> std::sync::MutexGuard<'_, Option<ActiveLink>> {
		self.active.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn reusable(&self, identity: UserId) -> Option<LinkId> {
		self.lock_active()
			.as_ref()
			.filter(|link| link.identity == identity && self.state_tx.borrow().is_connected())
			.map(|link| link.id)
	}

	fn teardown(&self) {
		if let Some(link) = self.lock_active().take() {
			debug!(id = %link.id, identity = %link.identity, "Closing live stream;");
			link.stop.cancel();
		}
	}

	/// Called by a link runner whose stream ended on its own. Stale runners are ignored.
	fn release(&self, id: LinkId, reason: Option<TransportError>) {
		let mut active = self.lock_active();

		if active.as_ref().is_some_and(|link| link.id == id) {
			match reason {
				Some(e) => warn!(%id, ?e, "Live stream errored;"),
				None => debug!(%id, "Live stream closed by remote;"),
			}

			if let Some(link) = active.take() {
				link.stop.cancel();
			}
			self.state_tx.send_replace(ConnectionState::Disconnected);
		}
	}
}

/// Pumps inbound frames and keepalive pings for one link until it closes or is cancelled.
async fn run_link(
	inner: Arc<Inner>,
	id: LinkId,
	inbound: futures::stream::BoxStream<'static, Result<String, TransportError>>,
	outbound: mpsc::UnboundedSender<String>,
	stop: CancellationToken,
) {
	enum StreamMessage {
		Frame(Result<String, TransportError>),
		Closed,
		Ping,
		Stop,
	}

	let mut keepalive = interval_at(
		Instant::now() + inner.keepalive.warmup(),
		inner.keepalive.period(),
	);
	keepalive.set_missed_tick_behavior(MissedTickBehavior::Skip);

	let cancel = pin!(stop.cancelled());

	let mut msg_stream = pin!((
		inbound
			.map(StreamMessage::Frame)
			.chain(stream::once(async { StreamMessage::Closed })),
		IntervalStream::new(keepalive).map(|_| StreamMessage::Ping),
		cancel.into_stream().map(|()| StreamMessage::Stop),
	)
		.merge());

	while let Some(msg) = msg_stream.next().await {
		match msg {
			StreamMessage::Frame(Ok(frame)) => match Envelope::decode(&frame) {
				Ok(envelope) => inner.inbound.publish(&envelope),
				Err(e) => trace!(%id, ?e, "Dropping malformed frame;"),
			},

			StreamMessage::Frame(Err(e)) => {
				inner.release(id, Some(e));
				break;
			}

			StreamMessage::Closed => {
				inner.release(id, None);
				break;
			}

			StreamMessage::Ping => {
				if outbound.send(Envelope::Ping.encode()).is_err() {
					trace!(%id, "Keepalive skipped, outbound side already closed;");
				}
			}

			StreamMessage::Stop => break,
		}
	}
}
