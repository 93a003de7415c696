use jm_realtime::{Envelope, Link, Transport, TransportError, UserId};

use std::sync::{
	atomic::{AtomicBool, AtomicUsize, Ordering},
	Mutex,
};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Server side of one link opened through [`MockTransport`].
pub struct RemoteEnd {
	pub identity: UserId,
	to_client: Option<mpsc::UnboundedSender<Result<String, TransportError>>>,
	from_client: mpsc::UnboundedReceiver<String>,
}

impl RemoteEnd {
	pub fn push(&self, envelope: &Envelope) {
		self.push_raw(&envelope.encode());
	}

	pub fn push_raw(&self, frame: &str) {
		if let Some(tx) = &self.to_client {
			tx.send(Ok(frame.to_string())).unwrap();
		}
	}

	pub fn fail(&self, reason: &str) {
		if let Some(tx) = &self.to_client {
			tx.send(Err(TransportError::Io(reason.to_string()))).unwrap();
		}
	}

	/// Remote close: the client's inbound stream ends.
	pub fn close(&mut self) {
		self.to_client = None;
	}

	/// Next frame the client wrote, if any is already queued.
	pub fn try_recv(&mut self) -> Option<String> {
		self.from_client.try_recv().ok()
	}

	/// Whether the client dropped its outbound side, which is how it closes the link.
	pub fn client_closed(&mut self) -> bool {
		matches!(
			self.from_client.try_recv(),
			Err(mpsc::error::TryRecvError::Disconnected)
		)
	}
}

/// In-memory transport. Each successful `open` hands the matching [`RemoteEnd`] to the test.
pub struct MockTransport {
	opened: AtomicUsize,
	refuse: AtomicBool,
	remotes: mpsc::UnboundedSender<RemoteEnd>,
	pending: Mutex<Option<mpsc::UnboundedReceiver<RemoteEnd>>>,
}

impl MockTransport {
	pub fn new() -> Self {
		let (remotes, pending) = mpsc::unbounded_channel();

		Self {
			opened: AtomicUsize::new(0),
			refuse: AtomicBool::new(false),
			remotes,
			pending: Mutex::new(Some(pending)),
		}
	}

	/// Receiver of every remote end opened from now on. Can only be taken once.
	pub fn remotes(&self) -> mpsc::UnboundedReceiver<RemoteEnd> {
		self.pending.lock().unwrap().take().unwrap()
	}

	pub fn opened(&self) -> usize {
		self.opened.load(Ordering::SeqCst)
	}

	pub fn refuse_connections(&self, refuse: bool) {
		self.refuse.store(refuse, Ordering::SeqCst);
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn open(&self, identity: UserId) -> Result<Link, TransportError> {
		if self.refuse.load(Ordering::SeqCst) {
			return Err(TransportError::Open {
				identity,
				reason: "connection refused".to_string(),
			});
		}

		self.opened.fetch_add(1, Ordering::SeqCst);

		let (to_client, inbound) = mpsc::unbounded_channel();
		let (outbound, from_client) = mpsc::unbounded_channel();

		// The test may not care about remote ends at all
		let _ = self.remotes.send(RemoteEnd {
			identity,
			to_client: Some(to_client),
			from_client,
		});

		Ok(Link {
			outbound,
			inbound: UnboundedReceiverStream::new(inbound).boxed(),
		})
	}
}
