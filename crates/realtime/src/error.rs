use std::path::PathBuf;

use thiserror::Error;

use crate::types::UserId;

#[derive(Debug, Error)]
pub enum Error {
	#[error(transparent)]
	Transport(#[from] TransportError),
	#[error(transparent)]
	Request(#[from] RequestError),
	#[error(transparent)]
	Validation(#[from] ValidationError),
}

/// The live stream could not be opened, or it errored underneath us.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
	#[error("failed to open live stream <identity='{identity}'>: {reason}")]
	Open { identity: UserId, reason: String },
	#[error("live stream errored: {0}")]
	Io(String),
}

/// A request/response collaborator rejected the call or could not be reached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RequestError {
	#[error("request rejected <status={status}>: {message}")]
	Rejected { status: u16, message: String },
	/// Reached the backend and got a well-formed answer that reports failure.
	#[error("request declined: {0}")]
	Declined(String),
	#[error("request could not be completed: {0}")]
	Network(String),
	#[error("malformed response: {0}")]
	Decode(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
	#[error("message content is empty")]
	EmptyContent,
	#[error("decision targets candidate <id='{given}'> but the current candidate is {current:?}")]
	NotCurrentCandidate {
		given: UserId,
		current: Option<UserId>,
	},
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("failed to read config file <path='{}'>: {source}", .path.display())]
	Read {
		path: PathBuf,
		source: std::io::Error,
	},
	#[error("failed to parse config: {0}")]
	Parse(#[from] serde_json::Error),
	#[error("invalid config: {0}")]
	Invalid(String),
}
