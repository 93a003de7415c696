use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_concurrency::future::Join;
use tokio::{spawn, task::JoinHandle};
use tracing::{debug, error, instrument, warn};

use crate::{
	collaborators::{MatchStore, PreferenceStore, ProfileSource},
	config::FilterConfig,
	error::{Error, RequestError, ValidationError},
	notifier::{MatchEvent, MatchNotifier},
	reconciler::LoadOutcome,
	session::SessionContext,
	types::{Candidate, PreferenceOptions, Preferences, PreferencesUpsert, UserId},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
	Like,
	Pass,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueueStatus {
	#[default]
	Idle,
	Loading,
	Ready {
		remaining: usize,
	},
	/// Every candidate was decided on. Only an explicit reload or a filter change brings new ones.
	Exhausted,
	Failed(RequestError),
}

/// How the match store answered a Like.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchResolution {
	Created,
	AlreadyExisted,
	Declined,
	Failed(RequestError),
	/// The creation task was aborted before the store answered.
	Aborted,
}

/// Match creation started by a Like. Dropping it does not cancel the request.
#[derive(Debug)]
pub struct PendingMatch {
	peer: UserId,
	handle: JoinHandle<MatchResolution>,
}

impl PendingMatch {
	#[must_use]
	pub const fn peer(&self) -> UserId {
		self.peer
	}

	pub async fn resolution(self) -> MatchResolution {
		self.handle.await.unwrap_or_else(|e| {
			warn!(?e, "Match creation task did not complete;");
			MatchResolution::Aborted
		})
	}
}

/// Filter form state as the user edits it. Ages arrive from a free-form numeric input.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterDraft {
	pub genders: Vec<String>,
	pub min_age: Option<f64>,
	pub max_age: Option<f64>,
	pub years: Vec<String>,
	pub majors: Vec<String>,
}

impl FilterDraft {
	/// Corrects the draft into something the preference store accepts.
	///
	/// Non-finite ages are cleared, finite ones clamped into `bounds`, an inverted range is swapped and
	/// empty selections become `None`.
	#[must_use]
	pub fn normalize(&self, bounds: &FilterConfig) -> PreferencesUpsert {
		let mut min_age = self.min_age.and_then(|age| clamp_age(age, bounds));
		let mut max_age = self.max_age.and_then(|age| clamp_age(age, bounds));

		if let (Some(min), Some(max)) = (min_age, max_age) {
			if min > max {
				min_age = Some(max);
				max_age = Some(min);
			}
		}

		PreferencesUpsert {
			gender_preference: non_empty(&self.genders),
			min_age,
			max_age,
			year_preference: non_empty(&self.years),
			major_preference: non_empty(&self.majors),
		}
	}
}

impl From<&Preferences> for FilterDraft {
	fn from(preferences: &Preferences) -> Self {
		Self {
			genders: preferences.gender_preference.clone().unwrap_or_default(),
			min_age: preferences.min_age.map(f64::from),
			max_age: preferences.max_age.map(f64::from),
			years: preferences.year_preference.clone().unwrap_or_default(),
			majors: preferences.major_preference.clone().unwrap_or_default(),
		}
	}
}

#[allow(clippy::cast_possible_truncation)]
fn clamp_age(age: f64, bounds: &FilterConfig) -> Option<i32> {
	let low = f64::from(bounds.min_age.min(bounds.max_age));
	let high = f64::from(bounds.min_age.max(bounds.max_age));

	// Rounded and clamped first, so the cast below is always in range
	age.is_finite().then(|| age.round().clamp(low, high) as i32)
}

fn non_empty(values: &[String]) -> Option<Vec<String>> {
	(!values.is_empty()).then(|| values.to_vec())
}

#[derive(Debug, Default)]
struct Deck {
	generation: u64,
	candidates: Vec<Candidate>,
	cursor: usize,
	status: QueueStatus,
	liked: Vec<UserId>,
	passed: Vec<UserId>,
}

impl Deck {
	fn remaining(&self) -> usize {
		self.candidates.len().saturating_sub(self.cursor)
	}

	fn settle(&mut self) {
		self.status = match self.remaining() {
			0 => QueueStatus::Exhausted,
			remaining => QueueStatus::Ready { remaining },
		};
	}
}

struct Inner {
	context: SessionContext,
	profiles: Arc<dyn ProfileSource>,
	matches: Arc<dyn MatchStore>,
	preferences: Arc<dyn PreferenceStore>,
	notifier: MatchNotifier,
	bounds: FilterConfig,
	deck: Mutex<Deck>,
}

/// Ordered deck of candidates with a cursor at the one currently shown.
#[derive(Clone)]
pub struct CandidateQueue {
	inner: Arc<Inner>,
}

impl CandidateQueue {
	#[must_use]
	pub fn new(
		context: SessionContext,
		profiles: Arc<dyn ProfileSource>,
		matches: Arc<dyn MatchStore>,
		preferences: Arc<dyn PreferenceStore>,
		notifier: MatchNotifier,
		bounds: FilterConfig,
	) -> Self {
		Self {
			inner: Arc::new(Inner {
				context,
				profiles,
				matches,
				preferences,
				notifier,
				bounds,
				deck: Mutex::default(),
			}),
		}
	}

	/// Replaces the deck with a fresh filtered queue and moves the cursor to its first candidate.
	#[instrument(skip(self), err)]
	pub async fn load_queue(&self, local: UserId) -> Result<LoadOutcome, Error> {
		let generation = {
			let mut deck = self.lock_deck();
			deck.generation += 1;
			deck.status = QueueStatus::Loading;
			deck.generation
		};

		let fetched = self.inner.profiles.queue(local).await;

		let mut deck = self.lock_deck();
		if deck.generation != generation {
			debug!("Discarding superseded queue response;");
			return Ok(LoadOutcome::Superseded);
		}

		match fetched {
			Ok(profiles) => {
				deck.candidates = profiles.into_iter().map(Candidate::from).collect();
				deck.cursor = 0;
				deck.settle();

				let count = deck.candidates.len();
				debug!(count, "Candidate queue loaded;");

				Ok(LoadOutcome::Applied { count })
			}
			Err(e) => {
				deck.status = QueueStatus::Failed(e.clone());
				Err(e.into())
			}
		}
	}

	/// Saved filters and the catalog of selectable values, fetched concurrently.
	#[instrument(skip(self), err)]
	pub async fn load_filters(
		&self,
		local: UserId,
	) -> Result<(Preferences, PreferenceOptions), Error> {
		let (saved, options) = (
			self.inner.preferences.get(local),
			self.inner.preferences.options(),
		)
			.join()
			.await;

		Ok((saved?, options?))
	}

	/// Persists the normalized filters, then reloads the queue from scratch.
	#[instrument(skip(self, draft), err)]
	pub async fn apply_filters(
		&self,
		local: UserId,
		draft: &FilterDraft,
	) -> Result<LoadOutcome, Error> {
		let upsert = draft.normalize(&self.inner.bounds);

		let ack = self.inner.preferences.put(local, &upsert).await?;
		if !ack.success {
			return Err(RequestError::Declined(format!(
				"preferences of user {local} were not saved"
			))
			.into());
		}

		debug!(?upsert, "Filters saved;");

		self.load_queue(local).await
	}

	/// Records a decision on the current candidate and moves to the next one.
	///
	/// A Like also starts match creation in the background; the cursor has already moved by the time
	/// the match store answers, and no answer moves it back.
	#[instrument(skip(self), err)]
	pub fn decide(
		&self,
		candidate: UserId,
		outcome: Outcome,
	) -> Result<Option<PendingMatch>, ValidationError> {
		let name = {
			let mut deck = self.lock_deck();

			let current = deck
				.candidates
				.get(deck.cursor)
				.map(|c| (c.id, c.name.clone()));
			let name = match current {
				Some((id, name)) if id == candidate => name,
				current => {
					return Err(ValidationError::NotCurrentCandidate {
						given: candidate,
						current: current.map(|(id, _)| id),
					});
				}
			};

			deck.cursor += 1;
			match outcome {
				Outcome::Like => deck.liked.push(candidate),
				Outcome::Pass => deck.passed.push(candidate),
			}
			deck.settle();

			name
		};

		if outcome == Outcome::Pass {
			return Ok(None);
		}

		Ok(Some(PendingMatch {
			peer: candidate,
			handle: spawn(create_match(
				Arc::clone(&self.inner.matches),
				self.inner.notifier.clone(),
				self.inner.context.local_id,
				MatchEvent {
					peer: candidate,
					name,
				},
			)),
		}))
	}

	#[must_use]
	pub fn current(&self) -> Option<Candidate> {
		let deck = self.lock_deck();
		deck.candidates.get(deck.cursor).cloned()
	}

	#[must_use]
	pub fn remaining(&self) -> usize {
		self.lock_deck().remaining()
	}

	#[must_use]
	pub fn status(&self) -> QueueStatus {
		self.lock_deck().status.clone()
	}

	/// Candidates liked during this session, in decision order.
	#[must_use]
	pub fn liked(&self) -> Vec<UserId> {
		self.lock_deck().liked.clone()
	}

	#[must_use]
	pub fn passed(&self) -> Vec<UserId> {
		self.lock_deck().passed.clone()
	}

	fn lock_deck(&self) -> MutexGuard<'_, Deck> {
		self.inner
			.deck
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}
}

async fn create_match(
	matches: Arc<dyn MatchStore>,
	notifier: MatchNotifier,
	local: UserId,
	event: MatchEvent,
) -> MatchResolution {
	let peer = event.peer;

	match matches.create(local, peer).await {
		Ok(response) if response.is_new_match() => {
			debug!(%peer, "New mutual match;");
			notifier.trigger(event);
			MatchResolution::Created
		}
		Ok(response) if response.success => MatchResolution::AlreadyExisted,
		Ok(response) => {
			warn!(%peer, message = ?response.message, "Match store declined the match;");
			MatchResolution::Declined
		}
		Err(e) => {
			error!(?e, %peer, "Failed to create match;");
			MatchResolution::Failed(e)
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn strings(values: &[&str]) -> Vec<String> {
		values.iter().map(ToString::to_string).collect()
	}

	#[test]
	fn inverted_age_range_is_swapped() {
		let upsert = FilterDraft {
			min_age: Some(30.0),
			max_age: Some(20.0),
			..Default::default()
		}
		.normalize(&FilterConfig::default());

		assert_eq!(upsert.min_age, Some(20));
		assert_eq!(upsert.max_age, Some(30));
	}

	#[test]
	fn ages_are_clamped_and_non_finite_cleared() {
		let bounds = FilterConfig::default();

		let upsert = FilterDraft {
			min_age: Some(3.0),
			max_age: Some(400.4),
			..Default::default()
		}
		.normalize(&bounds);
		assert_eq!((upsert.min_age, upsert.max_age), (Some(18), Some(120)));

		let upsert = FilterDraft {
			min_age: Some(f64::NAN),
			max_age: Some(f64::INFINITY),
			..Default::default()
		}
		.normalize(&bounds);
		assert_eq!((upsert.min_age, upsert.max_age), (None, None));

		let upsert = FilterDraft {
			min_age: Some(21.6),
			..Default::default()
		}
		.normalize(&bounds);
		assert_eq!((upsert.min_age, upsert.max_age), (Some(22), None));
	}

	#[test]
	fn inverted_bounds_still_clamp() {
		let upsert = FilterDraft {
			min_age: Some(25.0),
			max_age: Some(40.0),
			..Default::default()
		}
		.normalize(&FilterConfig {
			min_age: 30,
			max_age: 20,
		});

		assert_eq!((upsert.min_age, upsert.max_age), (Some(25), Some(30)));
	}

	#[test]
	fn empty_selections_become_null() {
		let upsert = FilterDraft {
			genders: vec![],
			years: strings(&["Junior", "Senior"]),
			majors: vec![],
			..Default::default()
		}
		.normalize(&FilterConfig::default());

		assert_eq!(upsert.gender_preference, None);
		assert_eq!(upsert.year_preference, Some(strings(&["Junior", "Senior"])));
		assert_eq!(upsert.major_preference, None);

		let json = serde_json::to_value(&upsert).unwrap();
		assert!(json["gender_preference"].is_null());
		assert!(json["min_age"].is_null());
	}

	#[test]
	fn draft_round_trips_saved_preferences() {
		let saved = Preferences {
			user_id: UserId(1),
			gender_preference: Some(strings(&["Female"])),
			min_age: Some(19),
			max_age: Some(25),
			year_preference: None,
			major_preference: Some(strings(&["Physics"])),
		};

		let upsert = FilterDraft::from(&saved).normalize(&FilterConfig::default());

		assert_eq!(upsert.gender_preference, saved.gender_preference);
		assert_eq!(upsert.min_age, Some(19));
		assert_eq!(upsert.max_age, Some(25));
		assert_eq!(upsert.year_preference, None);
		assert_eq!(upsert.major_preference, saved.major_preference);
	}
}
