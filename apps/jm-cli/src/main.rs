use jm_realtime::{
	Collaborators, ConnectionState, ConversationEvent, FilterDraft, LoadOutcome, MatchDirectory,
	MatchResolution, Message, Outcome, QueueStatus, Session, SessionContext, SyncConfig, UserId,
};
use jm_realtime_net::{Endpoints, HttpApi, WsTransport, DEFAULT_BASE_URL};

use std::{collections::HashSet, path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use futures::StreamExt;
use tokio::{
	io::{self, AsyncBufReadExt, BufReader},
	signal,
	time::sleep,
};
use tracing::{debug, error, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "jm", about = "JayMatch command line client")]
struct Cli {
	/// Backend base url; the live stream is reached on the same host
	#[arg(long, default_value = DEFAULT_BASE_URL)]
	base_url: String,

	/// Path to a JSON sync config
	#[arg(long)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Print a conversation and follow it live; every stdin line is sent as a message
	Chat {
		#[arg(long)]
		me: i64,
		/// Defaults to the first match
		#[arg(long)]
		peer: Option<i64>,
	},
	/// List matches
	Matches {
		#[arg(long)]
		me: i64,
	},
	/// Show the next candidate of the queue
	Queue {
		#[arg(long)]
		me: i64,
	},
	/// Like or pass the candidate at the head of the queue
	Swipe(SwipeArgs),
	/// Save swipe filters and reload the queue
	Filters(FilterArgs),
	/// Remove a match
	Unmatch {
		#[arg(long)]
		me: i64,
		#[arg(long)]
		peer: i64,
	},
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("decision").required(true).args(["like", "pass"])))]
struct SwipeArgs {
	#[arg(long)]
	me: i64,
	/// Only the head of the queue can be decided on; when given, the head must be this candidate
	#[arg(long)]
	candidate: Option<i64>,
	#[arg(long)]
	like: bool,
	#[arg(long)]
	pass: bool,
}

#[derive(Args, Debug)]
struct FilterArgs {
	#[arg(long)]
	me: i64,
	#[arg(long)]
	min_age: Option<f64>,
	#[arg(long)]
	max_age: Option<f64>,
	#[arg(long = "gender")]
	genders: Vec<String>,
	#[arg(long = "year")]
	years: Vec<String>,
	#[arg(long = "major")]
	majors: Vec<String>,
}

impl From<FilterArgs> for FilterDraft {
	fn from(args: FilterArgs) -> Self {
		Self {
			genders: args.genders,
			min_age: args.min_age,
			max_age: args.max_age,
			years: args.years,
			majors: args.majors,
		}
	}
}

#[tokio::main]
async fn main() -> Result<()> {
	// Logs go to stderr, stdout is reserved for command output
	tracing_subscriber::registry()
		.with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn,jm_realtime=info".into()))
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	let cli = Cli::parse();

	let config = match &cli.config {
		Some(path) => SyncConfig::load(path)
			.await
			.with_context(|| format!("failed to load config from {}", path.display()))?,
		None => SyncConfig::default(),
	};

	let endpoints = Endpoints::new(&cli.base_url)?;
	let api = Arc::new(HttpApi::new(endpoints.clone()));

	let session_for = |me: i64| {
		Session::new(
			SessionContext::new(UserId(me)),
			Collaborators {
				transport: Arc::new(WsTransport::new(endpoints.clone())),
				history: api.clone(),
				profiles: api.clone(),
				matches: api.clone(),
				preferences: api.clone(),
			},
			config.clone(),
		)
	};

	match cli.command {
		Commands::Chat { me, peer } => chat(session_for(me)?, peer.map(UserId)).await,

		Commands::Matches { me } => {
			let contacts = session_for(me)?.directory().load(UserId(me)).await?;

			if contacts.is_empty() {
				println!("No matches yet");
			}

			for contact in contacts {
				if contact.has_picture {
					println!(
						"{}\t{}\t{}",
						contact.id,
						contact.name,
						api.profile_picture_url(contact.id)
					);
				} else {
					println!("{}\t{}", contact.id, contact.name);
				}
			}

			Ok(())
		}

		Commands::Queue { me } => {
			let session = session_for(me)?;
			session.queue().load_queue(UserId(me)).await?;
			print_next(&session);

			Ok(())
		}

		Commands::Swipe(args) => swipe(session_for(args.me)?, &args).await,

		Commands::Filters(args) => {
			let session = session_for(args.me)?;
			let me = UserId(args.me);

			if let LoadOutcome::Applied { count } =
				session.queue().apply_filters(me, &args.into()).await?
			{
				println!("Filters saved, {count} candidates match");
			}
			print_next(&session);

			Ok(())
		}

		Commands::Unmatch { me, peer } => {
			session_for(me)?
				.directory()
				.unmatch(UserId(me), UserId(peer))
				.await?;
			println!("Unmatched {peer}");

			Ok(())
		}
	}
}

fn print_next(session: &Session) {
	match (session.queue().current(), session.queue().status()) {
		(Some(candidate), QueueStatus::Ready { remaining }) => {
			println!(
				"{}\t{}, {}\t{} {}\t{}",
				candidate.id,
				candidate.name,
				candidate.age,
				candidate.year,
				candidate.major,
				candidate.bio
			);
			if !candidate.interests.is_empty() {
				println!("\tinterests: {}", candidate.interests.join(", "));
			}
			println!("{remaining} candidates left");
		}
		_ => println!("No more candidates, try widening your filters"),
	}
}

/// The queue only accepts decisions on its head, so an explicit candidate must be that one.
fn pick_candidate(head: Option<UserId>, requested: Option<UserId>) -> Result<UserId> {
	match (head, requested) {
		(None, _) => bail!("no candidates left, try widening your filters"),
		(Some(head), None) => Ok(head),
		(Some(head), Some(requested)) if head == requested => Ok(head),
		(Some(head), Some(requested)) => {
			bail!("candidate {requested} is not at the head of the queue, {head} is")
		}
	}
}

async fn swipe(session: Session, args: &SwipeArgs) -> Result<()> {
	let me = UserId(args.me);
	let outcome = if args.like {
		Outcome::Like
	} else {
		Outcome::Pass
	};

	session.queue().load_queue(me).await?;

	let candidate = pick_candidate(
		session.queue().current().map(|candidate| candidate.id),
		args.candidate.map(UserId),
	)?;

	let Some(pending) = session.queue().decide(candidate, outcome)? else {
		println!("Passed {candidate}");
		return Ok(());
	};

	match pending.resolution().await {
		MatchResolution::Created => {
			let name = session
				.notifier()
				.current()
				.map_or_else(|| candidate.to_string(), |event| event.name);
			println!("It's a match with {name}!");
		}
		MatchResolution::AlreadyExisted => println!("Already matched with {candidate}"),
		MatchResolution::Declined | MatchResolution::Aborted => println!("Liked {candidate}"),
		MatchResolution::Failed(e) => {
			println!("Liked {candidate}, but the match could not be saved: {e}");
		}
	}

	Ok(())
}

/// Everything printed so far, keyed like the reconciler dedups, so a backfill after a reconnect
/// only prints what was missed.
#[derive(Default)]
struct Transcript {
	printed: HashSet<(UserId, UserId, String, i64)>,
}

impl Transcript {
	fn print(&mut self, me: UserId, message: &Message) {
		if !self.printed.insert((
			message.sender_id,
			message.receiver_id,
			message.content.clone(),
			message.timestamp,
		)) {
			return;
		}

		let author = if message.sender_id == me {
			"me".to_string()
		} else {
			message.sender_id.to_string()
		};

		println!("[{}] {author}: {}", message.timestamp, message.content);
	}
}

async fn chat(session: Session, peer: Option<UserId>) -> Result<()> {
	let me = session.context().local_id;

	let peer = match peer {
		Some(peer) => peer,
		None => {
			let contacts = session.directory().load(me).await?;
			MatchDirectory::initial_peer(&contacts, None).context("no matches to chat with yet")?
		}
	};

	session.start().await?;

	let result = follow(&session, me, peer).await;

	session.stop().await;

	result
}

async fn follow(session: &Session, me: UserId, peer: UserId) -> Result<()> {
	let mut transcript = Transcript::default();

	let mut events = session.reconciler().events();
	session.open_conversation(peer).await?;

	for message in session.reconciler().messages() {
		transcript.print(me, &message);
	}

	let mut lines = BufReader::new(io::stdin()).lines();
	let mut connectivity = session.connection().connectivity();
	connectivity.borrow_and_update();

	loop {
		tokio::select! {
			line = lines.next_line() => match line? {
				Some(line) if line.trim().is_empty() => {}
				Some(line) => {
					if let Err(e) = session.send_message(peer, &line).await {
						warn!(?e, "Failed to send message;");
					}
				}
				None => break,
			},

			Some(event) = events.next() => match event {
				ConversationEvent::Appended(message) => transcript.print(me, &message),
				ConversationEvent::System(text) => println!("* {text}"),
				other => debug!(?other, "Conversation event;"),
			},

			// A failed attempt flips the state back to disconnected, which lands here again
			Ok(()) = connectivity.changed() => {
				if *connectivity.borrow_and_update() == ConnectionState::Disconnected {
					warn!("Live stream lost, reconnecting;");
					sleep(Duration::from_secs(2)).await;

					match session.reconnect().await {
						Ok(_) => {
							for message in session.reconciler().messages() {
								transcript.print(me, &message);
							}
						}
						Err(e) => error!(?e, "Failed to reconnect;"),
					}
				}
			}

			_ = signal::ctrl_c() => break,
		}
	}

	Ok(())
}
