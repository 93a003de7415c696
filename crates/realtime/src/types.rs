use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable identifier of a user, supplied by the backend.
#[derive(
	Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
#[repr(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

impl From<i64> for UserId {
	fn from(id: i64) -> Self {
		Self(id)
	}
}

/// A chat message as carried by both the history store and the live stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
	/// Present once the backend persisted the message; live echoes usually omit it.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub id: Option<i64>,
	pub sender_id: UserId,
	pub receiver_id: UserId,
	pub content: String,
	/// Milliseconds since the unix epoch, assigned by the backend.
	pub timestamp: i64,
}

impl Message {
	/// Whether this message belongs to the conversation between `local` and `peer`.
	#[must_use]
	pub fn is_between(&self, local: UserId, peer: UserId) -> bool {
		(self.sender_id == local && self.receiver_id == peer)
			|| (self.sender_id == peer && self.receiver_id == local)
	}

	/// The other side of the conversation, seen from `local`.
	#[must_use]
	pub fn counterpart(&self, local: UserId) -> UserId {
		if self.sender_id == local {
			self.receiver_id
		} else {
			self.sender_id
		}
	}
}

/// Profile as returned by the profile source. Every display field is optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Profile {
	pub user_id: UserId,
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub age: Option<i32>,
	#[serde(default)]
	pub major: Option<String>,
	#[serde(default)]
	pub year: Option<String>,
	#[serde(default)]
	pub bio: Option<String>,
	#[serde(default)]
	pub interests: Option<Vec<String>>,
	#[serde(default)]
	pub profile_picture: Option<String>,
	#[serde(default)]
	pub gender: Option<String>,
}

/// Read-only swipe card built from a [`Profile`] with display fallbacks applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
	pub id: UserId,
	pub name: String,
	pub age: i32,
	pub major: String,
	pub year: String,
	pub bio: String,
	pub interests: Vec<String>,
	pub has_picture: bool,
	/// Empty when unset, so filters only ever match real values.
	pub gender: String,
}

impl From<Profile> for Candidate {
	fn from(profile: Profile) -> Self {
		let Profile {
			user_id,
			name,
			age,
			major,
			year,
			bio,
			interests,
			profile_picture,
			gender,
		} = profile;

		Self {
			id: user_id,
			name: name
				.filter(|name| !name.is_empty())
				.unwrap_or_else(|| "Anonymous".to_string()),
			age: age.unwrap_or_default(),
			major: major
				.filter(|major| !major.is_empty())
				.unwrap_or_else(|| "Undeclared".to_string()),
			year: year
				.filter(|year| !year.is_empty())
				.unwrap_or_else(|| "Unknown".to_string()),
			bio: bio
				.filter(|bio| !bio.is_empty())
				.unwrap_or_else(|| "No bio provided".to_string()),
			interests: interests.unwrap_or_default(),
			has_picture: profile_picture.is_some_and(|picture| !picture.is_empty()),
			gender: gender.unwrap_or_default(),
		}
	}
}

/// A stored match. The store keeps pairs with the lower id first, so either side may be the local user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRecord {
	pub user_id: UserId,
	pub matched_user_id: UserId,
	pub timestamp: i64,
}

impl MatchRecord {
	#[must_use]
	pub fn peer_of(&self, local: UserId) -> UserId {
		if self.user_id == local {
			self.matched_user_id
		} else {
			self.user_id
		}
	}
}

pub const MATCH_ALREADY_EXISTS: &str = "Match already exists";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateMatchResponse {
	pub success: bool,
	#[serde(default)]
	pub message: Option<String>,
}

impl CreateMatchResponse {
	/// Only a successful response that is not the "already exists" acknowledgement is a new match.
	#[must_use]
	pub fn is_new_match(&self) -> bool {
		self.success && self.message.as_deref() != Some(MATCH_ALREADY_EXISTS)
	}
}

/// Saved swipe filters of a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Preferences {
	#[serde(default)]
	pub user_id: UserId,
	#[serde(default)]
	pub gender_preference: Option<Vec<String>>,
	#[serde(default)]
	pub min_age: Option<i32>,
	#[serde(default)]
	pub max_age: Option<i32>,
	#[serde(default)]
	pub year_preference: Option<Vec<String>>,
	#[serde(default)]
	pub major_preference: Option<Vec<String>>,
}

/// Payload submitted when saving filters. Empty selections travel as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreferencesUpsert {
	pub gender_preference: Option<Vec<String>>,
	pub min_age: Option<i32>,
	pub max_age: Option<i32>,
	pub year_preference: Option<Vec<String>>,
	pub major_preference: Option<Vec<String>>,
}

/// Catalog of selectable filter values.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreferenceOptions {
	#[serde(default)]
	pub gender_options: Vec<String>,
	#[serde(default)]
	pub year_options: Vec<String>,
	#[serde(default)]
	pub major_options: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutAck {
	pub success: bool,
	#[serde(default)]
	pub user_id: UserId,
}
