#![allow(dead_code)]

use jm_realtime::{Collaborators, Message, UserId};

use std::{sync::Arc, time::Duration};

use tokio::time::{sleep, timeout};

pub mod backend;
pub mod transport;

use backend::MemoryBackend;
use transport::MockTransport;

pub fn collaborators(
	transport: &Arc<MockTransport>,
	backend: &Arc<MemoryBackend>,
) -> Collaborators {
	Collaborators {
		transport: transport.clone(),
		history: backend.clone(),
		profiles: backend.clone(),
		matches: backend.clone(),
		preferences: backend.clone(),
	}
}

pub fn message(sender: i64, receiver: i64, content: &str, timestamp: i64) -> Message {
	Message {
		id: None,
		sender_id: UserId(sender),
		receiver_id: UserId(receiver),
		content: content.to_string(),
		timestamp,
	}
}

/// Polls `condition` until it holds, giving background tasks a chance to run in between.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
	timeout(Duration::from_secs(5), async {
		while !condition() {
			sleep(Duration::from_millis(5)).await;
		}
	})
	.await
	.unwrap();
}
