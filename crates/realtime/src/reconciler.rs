use std::{
	collections::{HashMap, HashSet},
	sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::StreamExt;
use tokio::{spawn, task::yield_now};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::{
	collaborators::{HistoryStore, SendAck},
	connection::ConnectionManager,
	envelope::Envelope,
	error::{Error, RequestError, ValidationError},
	observe::Observers,
	session::SessionContext,
	types::{Message, UserId},
};

/// What the presentation layer gets told about the active conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationEvent {
	HistoryLoaded { peer: UserId, count: usize },
	HistoryFailed { peer: UserId, error: RequestError },
	Appended(Message),
	/// A live arrival older than the current tail. It was appended anyway, the log is not reordered.
	OutOfOrder { message: Message, tail_timestamp: i64 },
	/// Emitted one scheduler tick after the log grew, once layout had a chance to settle.
	ScrollToLatest,
	System(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadStatus {
	#[default]
	Idle,
	Loading,
	Ready,
	Failed(RequestError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
	Applied { count: usize },
	/// The user moved to another conversation (or asked again) before this response arrived.
	Superseded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
	pub content: String,
	pub timestamp: i64,
}

impl From<&Message> for Preview {
	fn from(message: &Message) -> Self {
		Self {
			content: message.content.clone(),
			timestamp: message.timestamp,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ConversationKey {
	local: UserId,
	peer: UserId,
}

/// Two entries are the same logical send only when all four fields match exactly.
#[derive(Debug, PartialEq, Eq, Hash)]
struct DedupKey {
	sender: UserId,
	receiver: UserId,
	content: String,
	timestamp: i64,
}

impl From<&Message> for DedupKey {
	fn from(message: &Message) -> Self {
		Self {
			sender: message.sender_id,
			receiver: message.receiver_id,
			content: message.content.clone(),
			timestamp: message.timestamp,
		}
	}
}

#[derive(Debug, Default)]
struct Conversation {
	key: Option<ConversationKey>,
	generation: u64,
	messages: Vec<Message>,
	seen: HashSet<DedupKey>,
	status: LoadStatus,
	// Length of `messages` when the in-flight history request started; later entries came live
	live_mark: Option<usize>,
	out_of_order: usize,
}

impl Conversation {
	fn switch_to(&mut self, key: Option<ConversationKey>) {
		self.key = key;
		self.generation += 1;
		self.messages.clear();
		self.seen.clear();
		self.status = LoadStatus::Idle;
		self.live_mark = None;
		self.out_of_order = 0;
	}

	fn tail_timestamp(&self) -> Option<i64> {
		self.messages.last().map(|message| message.timestamp)
	}
}

enum Appended {
	InOrder,
	OutOfOrder { tail_timestamp: i64 },
	Duplicate,
}

struct Inner {
	context: SessionContext,
	history: Arc<dyn HistoryStore>,
	conversation: Mutex<Conversation>,
	previews: Mutex<HashMap<UserId, Preview>>,
	events: Observers<ConversationEvent>,
	pump: Mutex<Option<CancellationToken>>,
}

/// Merges history backfill and live arrivals into the single ordered log of the active conversation.
///
/// Only the reconciler mutates the log; readers get snapshots through [`Reconciler::messages`].
#[derive(Clone)]
pub struct Reconciler {
	inner: Arc<Inner>,
}

impl Reconciler {
	#[must_use]
	pub fn new(context: SessionContext, history: Arc<dyn HistoryStore>) -> Self {
		Self {
			inner: Arc::new(Inner {
				context,
				history,
				conversation: Mutex::default(),
				previews: Mutex::default(),
				events: Observers::default(),
				pump: Mutex::new(None),
			}),
		}
	}

	/// Starts appending live envelopes delivered by `connection`.
	#[instrument(skip_all)]
	pub fn start(&self, connection: &ConnectionManager) {
		let mut pump = self.inner.pump.lock().unwrap_or_else(PoisonError::into_inner);

		if pump.is_some() {
			warn!("Reconciler already running!");
			return;
		}

		let stop = CancellationToken::new();
		*pump = Some(stop.clone());

		spawn(run_pump(self.clone(), connection.inbound(), stop));
	}

	#[instrument(skip_all)]
	pub fn stop(&self) {
		if let Some(stop) = self
			.inner
			.pump
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
		{
			stop.cancel();
		} else {
			trace!("Reconciler already stopped;");
		}
	}

	/// Makes the conversation with `peer` the active one. Switching peers drops the previous log and
	/// invalidates any history request still in flight for it.
	pub fn attach(&self, peer: UserId) {
		let key = ConversationKey {
			local: self.inner.context.local_id,
			peer,
		};

		let mut conversation = self.lock_conversation();
		if conversation.key != Some(key) {
			debug!(%peer, "Attaching conversation;");
			conversation.switch_to(Some(key));
		}
	}

	pub fn detach(&self) {
		self.lock_conversation().switch_to(None);
	}

	/// Replaces the log of the (now active) `local`/`peer` conversation with a window of history.
	///
	/// Live arrivals that landed while the request was in flight are kept after the history batch.
	#[instrument(skip(self), err)]
	pub async fn load_history(
		&self,
		local: UserId,
		peer: UserId,
		limit: usize,
	) -> Result<LoadOutcome, Error> {
		let key = ConversationKey { local, peer };

		let generation = {
			let mut conversation = self.lock_conversation();
			if conversation.key != Some(key) {
				conversation.switch_to(Some(key));
			}
			conversation.generation += 1;
			conversation.status = LoadStatus::Loading;
			conversation.live_mark = Some(conversation.messages.len());
			conversation.generation
		};

		let fetched = self.inner.history.fetch(local, peer, limit).await;

		let mut conversation = self.lock_conversation();
		if conversation.key != Some(key) || conversation.generation != generation {
			debug!("Discarding superseded history response;");
			return Ok(LoadOutcome::Superseded);
		}

		let live_mark = conversation.live_mark.take().unwrap_or_default();

		let mut batch = match fetched {
			Ok(batch) => batch,
			Err(e) => {
				conversation.status = LoadStatus::Failed(e.clone());
				drop(conversation);

				self.inner.events.publish(&ConversationEvent::HistoryFailed {
					peer,
					error: e.clone(),
				});

				return Err(e.into());
			}
		};

		// Stable sort, equal timestamps keep the order the store returned them in
		batch.sort_by_key(|message| message.timestamp);

		let split_at = live_mark.min(conversation.messages.len());
		let arrived_while_loading = conversation.messages.split_off(split_at);

		conversation.messages.clear();
		conversation.seen.clear();
		conversation.out_of_order = 0;

		for message in batch {
			if conversation.seen.insert(DedupKey::from(&message)) {
				conversation.messages.push(message);
			}
		}

		let count = conversation.messages.len();

		let mut out_of_order = vec![];
		for message in arrived_while_loading {
			if let Appended::OutOfOrder { tail_timestamp } =
				append(&mut conversation, message.clone())
			{
				out_of_order.push((message, tail_timestamp));
			}
		}

		conversation.status = LoadStatus::Ready;

		let tail = conversation.messages.last().map(Preview::from);
		drop(conversation);

		if let Some(tail) = tail {
			self.lock_previews().insert(peer, tail);
		}

		self.inner
			.events
			.publish(&ConversationEvent::HistoryLoaded { peer, count });
		for (message, tail_timestamp) in out_of_order {
			self.report_out_of_order(message, tail_timestamp);
		}
		self.scroll_to_latest_soon();

		Ok(LoadOutcome::Applied { count })
	}

	/// Submits a message for durable storage. Nothing is appended locally: the message shows up once
	/// the live stream echoes it back.
	#[instrument(skip(self, content), err)]
	pub async fn send(&self, local: UserId, peer: UserId, content: &str) -> Result<SendAck, Error> {
		let content = content.trim();
		if content.is_empty() {
			return Err(ValidationError::EmptyContent.into());
		}

		let ack = self.inner.history.send(local, peer, content).await?;

		if !ack.success {
			warn!(?ack, "History store did not confirm the message;");
		}

		Ok(ack)
	}

	/// Routes one live envelope. Messages outside the active conversation only refresh previews.
	pub fn ingest(&self, envelope: &Envelope) {
		match envelope {
			Envelope::Message(message) => self.ingest_message(message.clone()),
			Envelope::System(text) => self
				.inner
				.events
				.publish(&ConversationEvent::System(text.clone())),
			Envelope::Pong | Envelope::Ping => {}
		}
	}

	fn ingest_message(&self, message: Message) {
		let local = self.inner.context.local_id;

		if message.sender_id == local || message.receiver_id == local {
			self.lock_previews()
				.insert(message.counterpart(local), Preview::from(&message));
		}

		let mut conversation = self.lock_conversation();

		let Some(key) = conversation.key else {
			return;
		};

		if !message.is_between(key.local, key.peer) {
			return;
		}

		match append(&mut conversation, message.clone()) {
			Appended::Duplicate => {
				trace!(timestamp = message.timestamp, "Dropping duplicate live message;");
			}
			Appended::InOrder => {
				drop(conversation);
				self.inner
					.events
					.publish(&ConversationEvent::Appended(message));
				self.scroll_to_latest_soon();
			}
			Appended::OutOfOrder { tail_timestamp } => {
				drop(conversation);
				self.inner
					.events
					.publish(&ConversationEvent::Appended(message.clone()));
				self.report_out_of_order(message, tail_timestamp);
				self.scroll_to_latest_soon();
			}
		}
	}

	fn report_out_of_order(&self, message: Message, tail_timestamp: i64) {
		warn!(
			timestamp = message.timestamp,
			tail_timestamp, "Live message is older than the conversation tail;"
		);
		self.inner.events.publish(&ConversationEvent::OutOfOrder {
			message,
			tail_timestamp,
		});
	}

	fn scroll_to_latest_soon(&self) {
		let events = self.inner.events.clone();
		spawn(async move {
			yield_now().await;
			events.publish(&ConversationEvent::ScrollToLatest);
		});
	}

	/// Snapshot of the active conversation, oldest first.
	#[must_use]
	pub fn messages(&self) -> Vec<Message> {
		self.lock_conversation().messages.clone()
	}

	#[must_use]
	pub fn status(&self) -> LoadStatus {
		self.lock_conversation().status.clone()
	}

	#[must_use]
	pub fn active_peer(&self) -> Option<UserId> {
		self.lock_conversation().key.map(|key| key.peer)
	}

	/// How many live arrivals in the active conversation came in older than the tail.
	#[must_use]
	pub fn out_of_order_count(&self) -> usize {
		self.lock_conversation().out_of_order
	}

	#[must_use]
	pub fn preview(&self, peer: UserId) -> Option<Preview> {
		self.lock_previews().get(&peer).cloned()
	}

	#[must_use]
	pub fn events(&self) -> UnboundedReceiverStream<ConversationEvent> {
		self.inner.events.subscribe()
	}

	fn lock_conversation(&self) -> MutexGuard<'_, Conversation> {
		self.inner
			.conversation
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}

	fn lock_previews(&self) -> MutexGuard<'_, HashMap<UserId, Preview>> {
		self.inner
			.previews
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}
}

fn append(conversation: &mut Conversation, message: Message) -> Appended {
	if !conversation.seen.insert(DedupKey::from(&message)) {
		return Appended::Duplicate;
	}

	let outcome = match conversation.tail_timestamp() {
		Some(tail_timestamp) if message.timestamp < tail_timestamp => {
			conversation.out_of_order += 1;
			Appended::OutOfOrder { tail_timestamp }
		}
		_ => Appended::InOrder,
	};

	conversation.messages.push(message);

	outcome
}

async fn run_pump(
	reconciler: Reconciler,
	mut inbound: UnboundedReceiverStream<Envelope>,
	stop: CancellationToken,
) {
	loop {
		tokio::select! {
			() = stop.cancelled() => break,
			envelope = inbound.next() => match envelope {
				Some(envelope) => reconciler.ingest(&envelope),
				None => break,
			},
		}
	}

	trace!("Reconciler pump stopped;");
}
