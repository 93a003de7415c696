use jm_realtime::{
	types::{
		CreateMatchResponse, MatchRecord, PreferenceOptions, Preferences, PreferencesUpsert,
		PutAck, MATCH_ALREADY_EXISTS,
	},
	HistoryStore, MatchStore, Message, PreferenceStore, Profile, ProfileSource, RequestError,
	SendAck, UserId,
};

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicI64, Ordering},
		Mutex,
	},
	time::Duration,
};

use async_trait::async_trait;
use tokio::time::sleep;

/// What the next `MatchStore::create` call answers.
#[derive(Debug, Clone)]
pub enum CreateScript {
	New,
	AlreadyExists,
	Fail(RequestError),
}

#[derive(Debug, Default)]
pub struct Calls {
	pub history: Vec<(UserId, UserId, usize)>,
	pub sent: Vec<(UserId, UserId, String)>,
	pub queue: usize,
	pub profiles: Vec<UserId>,
	pub created: Vec<(UserId, UserId)>,
	pub deleted: Vec<(UserId, UserId)>,
	pub puts: Vec<PreferencesUpsert>,
	pub preference_gets: usize,
	pub option_gets: usize,
}

/// In-memory stand-in for every request/response collaborator.
pub struct MemoryBackend {
	pub calls: Mutex<Calls>,
	pub messages: Mutex<Vec<Message>>,
	pub history_delays: Mutex<HashMap<UserId, Duration>>,
	pub history_failure: Mutex<Option<RequestError>>,
	pub queue: Mutex<Vec<Vec<Profile>>>,
	pub queue_delays: Mutex<Vec<Duration>>,
	pub profiles: Mutex<HashMap<UserId, Profile>>,
	pub missing_profiles_fail: bool,
	pub matches: Mutex<Vec<MatchRecord>>,
	pub create_script: Mutex<CreateScript>,
	pub create_delay: Mutex<Duration>,
	pub preferences: Mutex<Preferences>,
	pub options: Mutex<PreferenceOptions>,
	pub request_delay: Duration,
	pub clock: AtomicI64,
}

impl Default for MemoryBackend {
	fn default() -> Self {
		Self {
			calls: Mutex::default(),
			messages: Mutex::default(),
			history_delays: Mutex::default(),
			history_failure: Mutex::default(),
			queue: Mutex::default(),
			queue_delays: Mutex::default(),
			profiles: Mutex::default(),
			missing_profiles_fail: true,
			matches: Mutex::default(),
			create_script: Mutex::new(CreateScript::New),
			create_delay: Mutex::default(),
			preferences: Mutex::default(),
			options: Mutex::default(),
			request_delay: Duration::from_millis(20),
			clock: AtomicI64::new(1_000),
		}
	}
}

impl MemoryBackend {
	pub fn calls<T>(&self, f: impl FnOnce(&Calls) -> T) -> T {
		f(&self.calls.lock().unwrap())
	}

	/// Each call to `queue` answers with the next batch; the last one repeats.
	pub fn set_queue_batches(&self, batches: Vec<Vec<Profile>>) {
		*self.queue.lock().unwrap() = batches;
	}

	pub fn add_profile(&self, id: i64, name: &str) {
		self.profiles.lock().unwrap().insert(
			UserId(id),
			Profile {
				user_id: UserId(id),
				name: Some(name.to_string()),
				..Default::default()
			},
		);
	}
}

pub fn profile(id: i64, name: &str) -> Profile {
	Profile {
		user_id: UserId(id),
		name: Some(name.to_string()),
		..Default::default()
	}
}

#[async_trait]
impl HistoryStore for MemoryBackend {
	async fn fetch(
		&self,
		local: UserId,
		peer: UserId,
		limit: usize,
	) -> Result<Vec<Message>, RequestError> {
		self.calls.lock().unwrap().history.push((local, peer, limit));

		let delay = self
			.history_delays
			.lock()
			.unwrap()
			.get(&peer)
			.copied()
			.unwrap_or_default();
		sleep(delay).await;

		if let Some(e) = self.history_failure.lock().unwrap().clone() {
			return Err(e);
		}

		// Newest first, the way the backend pages history
		let mut window = self
			.messages
			.lock()
			.unwrap()
			.iter()
			.filter(|message| message.is_between(local, peer))
			.cloned()
			.collect::<Vec<_>>();
		window.reverse();
		window.truncate(limit);

		Ok(window)
	}

	async fn send(
		&self,
		local: UserId,
		peer: UserId,
		content: &str,
	) -> Result<SendAck, RequestError> {
		self.calls
			.lock()
			.unwrap()
			.sent
			.push((local, peer, content.to_string()));

		let timestamp = self.clock.fetch_add(1, Ordering::SeqCst);
		self.messages.lock().unwrap().push(Message {
			id: None,
			sender_id: local,
			receiver_id: peer,
			content: content.to_string(),
			timestamp,
		});

		Ok(SendAck {
			success: true,
			timestamp,
		})
	}
}

#[async_trait]
impl ProfileSource for MemoryBackend {
	async fn queue(&self, _local: UserId) -> Result<Vec<Profile>, RequestError> {
		let call = {
			let mut calls = self.calls.lock().unwrap();
			calls.queue += 1;
			calls.queue - 1
		};

		let delay = {
			let delays = self.queue_delays.lock().unwrap();
			delays.get(call).or_else(|| delays.last()).copied()
		};
		sleep(delay.unwrap_or_default()).await;

		let batches = self.queue.lock().unwrap();
		Ok(batches
			.get(call)
			.or_else(|| batches.last())
			.cloned()
			.unwrap_or_default())
	}

	async fn profile(&self, id: UserId) -> Result<Profile, RequestError> {
		self.calls.lock().unwrap().profiles.push(id);
		sleep(self.request_delay).await;

		match self.profiles.lock().unwrap().get(&id) {
			Some(profile) => Ok(profile.clone()),
			None if self.missing_profiles_fail => Err(RequestError::Rejected {
				status: 404,
				message: format!("profile {id} not found"),
			}),
			None => Ok(Profile {
				user_id: id,
				..Default::default()
			}),
		}
	}
}

#[async_trait]
impl MatchStore for MemoryBackend {
	async fn create(
		&self,
		local: UserId,
		peer: UserId,
	) -> Result<CreateMatchResponse, RequestError> {
		self.calls.lock().unwrap().created.push((local, peer));

		let delay = *self.create_delay.lock().unwrap();
		sleep(delay).await;

		let script = self.create_script.lock().unwrap().clone();
		match script {
			CreateScript::New => Ok(CreateMatchResponse {
				success: true,
				message: Some("Match created".to_string()),
			}),
			CreateScript::AlreadyExists => Ok(CreateMatchResponse {
				success: true,
				message: Some(MATCH_ALREADY_EXISTS.to_string()),
			}),
			CreateScript::Fail(e) => Err(e),
		}
	}

	async fn list(&self, local: UserId) -> Result<Vec<MatchRecord>, RequestError> {
		Ok(self
			.matches
			.lock()
			.unwrap()
			.iter()
			.filter(|record| record.user_id == local || record.matched_user_id == local)
			.copied()
			.collect())
	}

	async fn delete(&self, local: UserId, peer: UserId) -> Result<(), RequestError> {
		self.calls.lock().unwrap().deleted.push((local, peer));

		self.matches.lock().unwrap().retain(|record| {
			!(record.peer_of(local) == peer
				&& (record.user_id == local || record.matched_user_id == local))
		});

		Ok(())
	}
}

#[async_trait]
impl PreferenceStore for MemoryBackend {
	async fn get(&self, local: UserId) -> Result<Preferences, RequestError> {
		self.calls.lock().unwrap().preference_gets += 1;
		sleep(self.request_delay).await;

		Ok(Preferences {
			user_id: local,
			..self.preferences.lock().unwrap().clone()
		})
	}

	async fn options(&self) -> Result<PreferenceOptions, RequestError> {
		self.calls.lock().unwrap().option_gets += 1;
		sleep(self.request_delay).await;

		Ok(self.options.lock().unwrap().clone())
	}

	async fn put(
		&self,
		local: UserId,
		preferences: &PreferencesUpsert,
	) -> Result<PutAck, RequestError> {
		self.calls.lock().unwrap().puts.push(preferences.clone());

		sleep(self.request_delay).await;

		let mut saved = self.preferences.lock().unwrap();
		saved.gender_preference = preferences.gender_preference.clone();
		saved.min_age = preferences.min_age;
		saved.max_age = preferences.max_age;
		saved.year_preference = preferences.year_preference.clone();
		saved.major_preference = preferences.major_preference.clone();

		Ok(PutAck {
			success: true,
			user_id: local,
		})
	}
}
