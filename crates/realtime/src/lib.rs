#![warn(
	clippy::all,
	clippy::pedantic,
	clippy::correctness,
	clippy::perf,
	clippy::style,
	clippy::suspicious,
	clippy::complexity,
	clippy::nursery,
	clippy::unwrap_used,
	unused_qualifications,
	rust_2018_idioms,
	trivial_casts,
	trivial_numeric_casts,
	unused_allocation,
	clippy::unnecessary_cast,
	clippy::cast_lossless,
	clippy::cast_possible_truncation,
	clippy::cast_possible_wrap,
	clippy::cast_precision_loss,
	clippy::cast_sign_loss,
	clippy::dbg_macro,
	clippy::deprecated_cfg_attr,
	clippy::separated_literal_suffix,
	deprecated
)]
#![forbid(deprecated_in_future)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]

//! Realtime sync engine for the JayMatch client.
//!
//! The crate keeps the local view of a conversation with a matched peer (history backfill merged with
//! a live stream) and drives the swipe deck: gesture tracking, the candidate queue and the transient
//! "it's a match" overlay. Everything that talks to the network goes through the collaborator traits
//! in [`collaborators`], so the engine itself never opens a socket.

pub mod collaborators;
pub mod config;
pub mod connection;
pub mod contacts;
pub mod envelope;
pub mod gesture;
pub mod notifier;
pub mod observe;
pub mod queue;
pub mod reconciler;
pub mod session;
pub mod types;

mod error;

pub use collaborators::{
	HistoryStore, Link, MatchStore, PreferenceStore, ProfileSource, SendAck, Transport,
};
pub use config::SyncConfig;
pub use connection::{ConnectionManager, ConnectionState, LinkId};
pub use contacts::{Contact, MatchDirectory};
pub use envelope::Envelope;
pub use error::{ConfigError, Error, RequestError, TransportError, ValidationError};
pub use gesture::{CardVisual, Decision, GestureEngine, PointerPhase, PointerSample};
pub use notifier::{MatchEvent, MatchNotifier};
pub use queue::{CandidateQueue, FilterDraft, MatchResolution, Outcome, QueueStatus};
pub use reconciler::{ConversationEvent, LoadOutcome, LoadStatus, Reconciler};
pub use session::{Collaborators, Session, SessionContext};
pub use types::{Candidate, Message, Profile, UserId};
