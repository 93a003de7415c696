use jm_realtime::{Link, Transport, TransportError, UserId};

use async_trait::async_trait;
use futures::{future, SinkExt, StreamExt};
use tokio::{spawn, sync::mpsc};
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tracing::{debug, instrument, trace, warn};

use crate::endpoints::Endpoints;

/// Live stream transport over the backend's `/ws/{id}` WebSocket.
#[derive(Debug, Clone)]
pub struct WsTransport {
	endpoints: Endpoints,
}

impl WsTransport {
	#[must_use]
	pub const fn new(endpoints: Endpoints) -> Self {
		Self { endpoints }
	}
}

#[async_trait]
impl Transport for WsTransport {
	#[instrument(skip(self), err)]
	async fn open(&self, identity: UserId) -> Result<Link, TransportError> {
		let url = self.endpoints.live(identity);

		let (socket, _response) = connect_async(url.as_str())
			.await
			.map_err(|e| TransportError::Open {
				identity,
				reason: e.to_string(),
			})?;

		let (mut sink, source) = socket.split();
		let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<String>();

		// Writer: drains outbound frames, closes the socket once every sender is gone
		spawn(async move {
			while let Some(frame) = outbound_rx.recv().await {
				if let Err(e) = sink.send(WsMessage::Text(frame.into())).await {
					warn!(?e, "Failed to write frame to the live stream;");
					break;
				}
			}

			if let Err(e) = sink.close().await {
				trace!(?e, "Live stream was already closed;");
			}
		});

		let inbound = source
			.filter_map(|message| {
				future::ready(match message {
					Ok(WsMessage::Text(text)) => Some(Ok(text.to_string())),
					Ok(WsMessage::Close(frame)) => {
						debug!(?frame, "Live stream closed by the backend;");
						None
					}
					// Binary frames are not part of the protocol, control frames are handled by tungstenite
					Ok(_) => None,
					Err(e) => Some(Err(TransportError::Io(e.to_string()))),
				})
			})
			.boxed();

		Ok(Link { outbound, inbound })
	}
}
