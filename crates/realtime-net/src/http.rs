use jm_realtime::{
	types::{
		CreateMatchResponse, MatchRecord, PreferenceOptions, Preferences, PreferencesUpsert,
		PutAck,
	},
	HistoryStore, MatchStore, Message, PreferenceStore, Profile, ProfileSource, RequestError,
	SendAck, UserId,
};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{instrument, trace};

use crate::endpoints::Endpoints;

#[derive(Debug, Serialize)]
struct NewMessage<'a> {
	sender_id: UserId,
	receiver_id: UserId,
	content: &'a str,
}

#[derive(Debug, Serialize)]
struct MatchPair {
	user_id: UserId,
	matched_user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct Acknowledgement {
	success: bool,
	#[serde(default)]
	message: Option<String>,
}

/// Request/response collaborators backed by the JayMatch REST api.
#[derive(Debug, Clone)]
pub struct HttpApi {
	client: Client,
	endpoints: Endpoints,
}

impl HttpApi {
	#[must_use]
	pub fn new(endpoints: Endpoints) -> Self {
		Self::with_client(Client::new(), endpoints)
	}

	#[must_use]
	pub const fn with_client(client: Client, endpoints: Endpoints) -> Self {
		Self { client, endpoints }
	}

	#[must_use]
	pub const fn endpoints(&self) -> &Endpoints {
		&self.endpoints
	}

	/// Where the profile picture of `id` is served from. The backend answers 404 when there is none.
	#[must_use]
	pub fn profile_picture_url(&self, id: UserId) -> String {
		self.endpoints.profile_picture(id)
	}
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, RequestError> {
	let response = request
		.send()
		.await
		.map_err(|e| RequestError::Network(e.to_string()))?;

	let status = response.status();
	if !status.is_success() {
		let message = response.text().await.unwrap_or_default();
		return Err(RequestError::Rejected {
			status: status.as_u16(),
			message,
		});
	}

	response
		.json::<T>()
		.await
		.map_err(|e| RequestError::Decode(e.to_string()))
}

#[async_trait]
impl HistoryStore for HttpApi {
	#[instrument(skip(self), err)]
	async fn fetch(
		&self,
		local: UserId,
		peer: UserId,
		limit: usize,
	) -> Result<Vec<Message>, RequestError> {
		execute(
			self.client
				.get(self.endpoints.conversation(local, peer))
				.query(&[("limit", limit)]),
		)
		.await
	}

	#[instrument(skip(self, content), err)]
	async fn send(
		&self,
		local: UserId,
		peer: UserId,
		content: &str,
	) -> Result<SendAck, RequestError> {
		execute(self.client.post(self.endpoints.messages()).json(&NewMessage {
			sender_id: local,
			receiver_id: peer,
			content,
		}))
		.await
	}
}

#[async_trait]
impl ProfileSource for HttpApi {
	#[instrument(skip(self), err)]
	async fn queue(&self, local: UserId) -> Result<Vec<Profile>, RequestError> {
		execute(self.client.get(self.endpoints.queue(local))).await
	}

	#[instrument(skip(self), err)]
	async fn profile(&self, id: UserId) -> Result<Profile, RequestError> {
		execute(self.client.get(self.endpoints.profile(id))).await
	}
}

#[async_trait]
impl MatchStore for HttpApi {
	#[instrument(skip(self), err)]
	async fn create(
		&self,
		local: UserId,
		peer: UserId,
	) -> Result<CreateMatchResponse, RequestError> {
		execute(self.client.post(self.endpoints.matches()).json(&MatchPair {
			user_id: local,
			matched_user_id: peer,
		}))
		.await
	}

	#[instrument(skip(self), err)]
	async fn list(&self, local: UserId) -> Result<Vec<MatchRecord>, RequestError> {
		execute(self.client.get(self.endpoints.matches_of(local))).await
	}

	#[instrument(skip(self), err)]
	async fn delete(&self, local: UserId, peer: UserId) -> Result<(), RequestError> {
		let ack = execute::<Acknowledgement>(self.client.delete(self.endpoints.matches()).json(
			&MatchPair {
				user_id: local,
				matched_user_id: peer,
			},
		))
		.await?;

		if ack.success {
			trace!(message = ?ack.message, "Match deleted;");
			Ok(())
		} else {
			Err(RequestError::Declined(
				ack.message
					.unwrap_or_else(|| format!("match between {local} and {peer} not deleted")),
			))
		}
	}
}

#[async_trait]
impl PreferenceStore for HttpApi {
	#[instrument(skip(self), err)]
	async fn get(&self, local: UserId) -> Result<Preferences, RequestError> {
		execute(self.client.get(self.endpoints.preferences(local))).await
	}

	#[instrument(skip(self), err)]
	async fn options(&self) -> Result<PreferenceOptions, RequestError> {
		execute(self.client.get(self.endpoints.preference_options())).await
	}

	#[instrument(skip(self, preferences), err)]
	async fn put(
		&self,
		local: UserId,
		preferences: &PreferencesUpsert,
	) -> Result<PutAck, RequestError> {
		execute(
			self.client
				.put(self.endpoints.preferences(local))
				.json(preferences),
		)
		.await
	}
}
