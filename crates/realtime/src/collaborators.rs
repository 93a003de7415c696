//! Seams to the network. The engine only ever talks to the backend through these traits; concrete
//! HTTP/WebSocket implementations live outside this crate.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
	error::{RequestError, TransportError},
	types::{
		CreateMatchResponse, MatchRecord, Message, PreferenceOptions, Preferences,
		PreferencesUpsert, Profile, PutAck, UserId,
	},
};

/// An open bidirectional stream bound to one identity.
///
/// Dropping `outbound` asks the transport to close the stream. `inbound` ends when the remote side
/// closes; an `Err` item means the stream errored and will yield nothing more.
pub struct Link {
	pub outbound: mpsc::UnboundedSender<String>,
	pub inbound: BoxStream<'static, Result<String, TransportError>>,
}

impl fmt::Debug for Link {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Link")
			.field("outbound_closed", &self.outbound.is_closed())
			.finish_non_exhaustive()
	}
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
	async fn open(&self, identity: UserId) -> Result<Link, TransportError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendAck {
	pub success: bool,
	/// Timestamp the backend assigned to the stored message.
	pub timestamp: i64,
}

#[async_trait]
pub trait HistoryStore: Send + Sync + 'static {
	/// Returns up to `limit` messages of the pair, in the order the store happened to produce them.
	async fn fetch(
		&self,
		local: UserId,
		peer: UserId,
		limit: usize,
	) -> Result<Vec<Message>, RequestError>;

	async fn send(
		&self,
		local: UserId,
		peer: UserId,
		content: &str,
	) -> Result<SendAck, RequestError>;
}

#[async_trait]
pub trait ProfileSource: Send + Sync + 'static {
	/// Candidates for `local`, already filtered by the user's saved preferences.
	async fn queue(&self, local: UserId) -> Result<Vec<Profile>, RequestError>;

	async fn profile(&self, id: UserId) -> Result<Profile, RequestError>;
}

#[async_trait]
pub trait MatchStore: Send + Sync + 'static {
	async fn create(
		&self,
		local: UserId,
		peer: UserId,
	) -> Result<CreateMatchResponse, RequestError>;

	async fn list(&self, local: UserId) -> Result<Vec<MatchRecord>, RequestError>;

	async fn delete(&self, local: UserId, peer: UserId) -> Result<(), RequestError>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync + 'static {
	async fn get(&self, local: UserId) -> Result<Preferences, RequestError>;

	async fn options(&self) -> Result<PreferenceOptions, RequestError>;

	async fn put(
		&self,
		local: UserId,
		preferences: &PreferencesUpsert,
	) -> Result<PutAck, RequestError>;
}
