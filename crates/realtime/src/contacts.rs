use std::{collections::HashSet, sync::Arc};

use futures::future::try_join_all;
use tracing::{debug, instrument};

use crate::{
	collaborators::{MatchStore, ProfileSource},
	error::Error,
	types::{Profile, UserId},
};

/// A matched peer as listed next to the conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contact {
	pub id: UserId,
	pub name: String,
	pub has_picture: bool,
}

impl From<Profile> for Contact {
	fn from(profile: Profile) -> Self {
		Self {
			id: profile.user_id,
			name: profile
				.name
				.filter(|name| !name.is_empty())
				.unwrap_or_else(|| format!("User {}", profile.user_id)),
			has_picture: profile
				.profile_picture
				.is_some_and(|picture| !picture.is_empty()),
		}
	}
}

/// The local user's matches, resolved into displayable contacts.
#[derive(Clone)]
pub struct MatchDirectory {
	matches: Arc<dyn MatchStore>,
	profiles: Arc<dyn ProfileSource>,
}

impl MatchDirectory {
	#[must_use]
	pub fn new(matches: Arc<dyn MatchStore>, profiles: Arc<dyn ProfileSource>) -> Self {
		Self { matches, profiles }
	}

	/// Every distinct peer the local user matched with, in the order the store listed them.
	///
	/// Profiles are fetched concurrently, one request per peer; if any of them fails the whole load
	/// fails.
	#[instrument(skip(self), err)]
	pub async fn load(&self, local: UserId) -> Result<Vec<Contact>, Error> {
		let records = self.matches.list(local).await?;

		let mut seen = HashSet::with_capacity(records.len());
		let peers = records
			.iter()
			.map(|record| record.peer_of(local))
			.filter(|peer| *peer != local && seen.insert(*peer))
			.collect::<Vec<_>>();

		debug!(
			records = records.len(),
			peers = peers.len(),
			"Resolving match profiles;"
		);

		let profiles =
			try_join_all(peers.into_iter().map(|peer| self.profiles.profile(peer))).await?;

		Ok(profiles.into_iter().map(Contact::from).collect())
	}

	#[instrument(skip(self), err)]
	pub async fn unmatch(&self, local: UserId, peer: UserId) -> Result<(), Error> {
		self.matches.delete(local, peer).await?;

		debug!("Match removed;");

		Ok(())
	}

	/// Conversation to open first: `preferred` when it is among `contacts`, the first contact otherwise.
	#[must_use]
	pub fn initial_peer(contacts: &[Contact], preferred: Option<UserId>) -> Option<UserId> {
		preferred
			.filter(|preferred| contacts.iter().any(|contact| contact.id == *preferred))
			.or_else(|| contacts.first().map(|contact| contact.id))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn contact(id: i64) -> Contact {
		Contact {
			id: UserId(id),
			name: format!("User {id}"),
			has_picture: false,
		}
	}

	#[test]
	fn contact_name_falls_back_to_id() {
		let contact = Contact::from(Profile {
			user_id: UserId(12),
			profile_picture: Some(String::new()),
			..Default::default()
		});

		assert_eq!(contact.name, "User 12");
		assert!(!contact.has_picture);
	}

	#[test]
	fn initial_peer_prefers_known_contact() {
		let contacts = [contact(3), contact(9)];

		assert_eq!(
			MatchDirectory::initial_peer(&contacts, Some(UserId(9))),
			Some(UserId(9))
		);
		assert_eq!(
			MatchDirectory::initial_peer(&contacts, Some(UserId(4))),
			Some(UserId(3))
		);
		assert_eq!(
			MatchDirectory::initial_peer(&contacts, None),
			Some(UserId(3))
		);
		assert_eq!(MatchDirectory::initial_peer(&[], Some(UserId(9))), None);
	}
}
