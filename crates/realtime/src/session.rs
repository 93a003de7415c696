use std::sync::Arc;

use tracing::{debug, instrument, trace};

use crate::{
	collaborators::{HistoryStore, MatchStore, PreferenceStore, ProfileSource, SendAck, Transport},
	config::SyncConfig,
	connection::{ConnectionManager, LinkId},
	contacts::MatchDirectory,
	error::{ConfigError, Error},
	gesture::{CardVisual, Decision, GestureEngine, PointerSample},
	notifier::MatchNotifier,
	queue::CandidateQueue,
	reconciler::{LoadOutcome, Reconciler},
	types::UserId,
};

/// Who is signed in. Handed explicitly to every component that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
	pub local_id: UserId,
}

impl SessionContext {
	#[must_use]
	pub const fn new(local_id: UserId) -> Self {
		Self { local_id }
	}
}

/// Every backend seam the engine depends on.
#[derive(Clone)]
pub struct Collaborators {
	pub transport: Arc<dyn Transport>,
	pub history: Arc<dyn HistoryStore>,
	pub profiles: Arc<dyn ProfileSource>,
	pub matches: Arc<dyn MatchStore>,
	pub preferences: Arc<dyn PreferenceStore>,
}

/// Wires all components together for one signed-in user.
pub struct Session {
	context: SessionContext,
	config: SyncConfig,
	connection: ConnectionManager,
	reconciler: Reconciler,
	queue: CandidateQueue,
	gesture: GestureEngine,
	notifier: MatchNotifier,
	directory: MatchDirectory,
}

impl Session {
	/// Rejects a config that fails [`SyncConfig::validate`], so hand-built configs get the same
	/// checks as loaded ones.
	pub fn new(
		context: SessionContext,
		collaborators: Collaborators,
		config: SyncConfig,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		let Collaborators {
			transport,
			history,
			profiles,
			matches,
			preferences,
		} = collaborators;

		let notifier = MatchNotifier::new(config.notifier);

		Ok(Self {
			context,
			connection: ConnectionManager::new(transport, config.keepalive),
			reconciler: Reconciler::new(context, history),
			queue: CandidateQueue::new(
				context,
				Arc::clone(&profiles),
				Arc::clone(&matches),
				preferences,
				notifier.clone(),
				config.filters,
			),
			gesture: GestureEngine::new(config.gesture),
			notifier,
			directory: MatchDirectory::new(matches, profiles),
			config,
		})
	}

	/// Opens the live stream, then starts feeding it into the reconciler.
	#[instrument(skip(self), fields(local = %self.context.local_id), err)]
	pub async fn start(&self) -> Result<LinkId, Error> {
		let id = self.connection.connect(self.context.local_id).await?;
		self.reconciler.start(&self.connection);

		debug!(%id, "Session started;");

		Ok(id)
	}

	/// Tears everything down, the live stream last.
	#[instrument(skip(self), fields(local = %self.context.local_id))]
	pub async fn stop(&self) {
		self.reconciler.detach();
		self.reconciler.stop();
		self.notifier.stop();
		self.connection.disconnect().await;

		debug!("Session stopped;");
	}

	/// Reopens the live stream after it dropped and backfills the active conversation, since
	/// nothing is pushed to the local user while no stream is open.
	#[instrument(skip(self), fields(local = %self.context.local_id), err)]
	pub async fn reconnect(&self) -> Result<Option<LoadOutcome>, Error> {
		let id = self.connection.connect(self.context.local_id).await?;
		debug!(%id, "Session reconnected;");

		match self.reconciler.active_peer() {
			Some(peer) => self.open_conversation(peer).await.map(Some),
			None => Ok(None),
		}
	}

	/// Makes `peer` the active conversation and backfills its history.
	pub async fn open_conversation(&self, peer: UserId) -> Result<LoadOutcome, Error> {
		self.reconciler.attach(peer);
		self.reconciler
			.load_history(self.context.local_id, peer, self.config.history.limit)
			.await
	}

	pub async fn send_message(&self, peer: UserId, content: &str) -> Result<SendAck, Error> {
		self.reconciler
			.send(self.context.local_id, peer, content)
			.await
	}

	/// Feeds one pointer sample to the swipe card. A committed gesture is applied to the current
	/// candidate; the resulting decision is returned either way.
	pub fn on_pointer(&mut self, sample: PointerSample) -> Result<Option<Decision>, Error> {
		let Some(decision) = self.gesture.handle(sample) else {
			return Ok(None);
		};

		if let Some(outcome) = decision.outcome() {
			match self.queue.current() {
				Some(candidate) => {
					self.queue.decide(candidate.id, outcome)?;
				}
				None => trace!(?decision, "No candidate left to decide on;"),
			}
		}

		Ok(Some(decision))
	}

	#[must_use]
	pub const fn context(&self) -> SessionContext {
		self.context
	}

	#[must_use]
	pub const fn config(&self) -> &SyncConfig {
		&self.config
	}

	#[must_use]
	pub const fn connection(&self) -> &ConnectionManager {
		&self.connection
	}

	#[must_use]
	pub const fn reconciler(&self) -> &Reconciler {
		&self.reconciler
	}

	#[must_use]
	pub const fn queue(&self) -> &CandidateQueue {
		&self.queue
	}

	#[must_use]
	pub const fn notifier(&self) -> &MatchNotifier {
		&self.notifier
	}

	#[must_use]
	pub const fn directory(&self) -> &MatchDirectory {
		&self.directory
	}

	#[must_use]
	pub const fn card_visual(&self) -> CardVisual {
		self.gesture.visual()
	}
}
