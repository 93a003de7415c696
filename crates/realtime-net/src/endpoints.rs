use jm_realtime::UserId;

use reqwest::Url;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.jaymatch.cc";

#[derive(Debug, Error)]
pub enum EndpointError {
	#[error("invalid backend url <url='{url}'>: {reason}")]
	InvalidUrl { url: String, reason: String },
	#[error("unsupported backend url scheme <scheme='{0}'>, expected http or https")]
	UnsupportedScheme(String),
}

/// Every backend route the adapters talk to, derived from a single base url.
///
/// The live stream lives on the same host, with `ws`/`wss` in place of `http`/`https`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
	http: String,
	ws: String,
}

impl Endpoints {
	pub fn new(base: &str) -> Result<Self, EndpointError> {
		let url = Url::parse(base).map_err(|e| EndpointError::InvalidUrl {
			url: base.to_string(),
			reason: e.to_string(),
		})?;

		let ws_scheme = match url.scheme() {
			"https" => "wss",
			"http" => "ws",
			other => return Err(EndpointError::UnsupportedScheme(other.to_string())),
		};

		let http = url.as_str().trim_end_matches('/').to_string();
		let ws = format!("{ws_scheme}{}", &http[url.scheme().len()..]);

		Ok(Self { http, ws })
	}

	#[must_use]
	pub fn base(&self) -> &str {
		&self.http
	}

	#[must_use]
	pub fn live(&self, identity: UserId) -> String {
		format!("{}/ws/{identity}", self.ws)
	}

	#[must_use]
	pub fn conversation(&self, a: UserId, b: UserId) -> String {
		format!("{}/messages/{a}/{b}", self.http)
	}

	#[must_use]
	pub fn messages(&self) -> String {
		format!("{}/messages", self.http)
	}

	#[must_use]
	pub fn queue(&self, local: UserId) -> String {
		format!("{}/queue/{local}", self.http)
	}

	#[must_use]
	pub fn profile(&self, id: UserId) -> String {
		format!("{}/profiles/{id}", self.http)
	}

	#[must_use]
	pub fn profile_picture(&self, id: UserId) -> String {
		format!("{}/users/{id}/profile-picture", self.http)
	}

	#[must_use]
	pub fn matches(&self) -> String {
		format!("{}/matches", self.http)
	}

	#[must_use]
	pub fn matches_of(&self, local: UserId) -> String {
		format!("{}/matches/{local}", self.http)
	}

	#[must_use]
	pub fn preferences(&self, local: UserId) -> String {
		format!("{}/preferences/{local}", self.http)
	}

	#[must_use]
	pub fn preference_options(&self) -> String {
		format!("{}/preference-options", self.http)
	}
}

impl Default for Endpoints {
	fn default() -> Self {
		Self {
			http: DEFAULT_BASE_URL.to_string(),
			ws: "wss://api.jaymatch.cc".to_string(),
		}
	}
}
