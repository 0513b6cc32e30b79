//! Per-server realtime room feed
//!
//! A feed is one streaming connection to a server's room endpoint. The feed
//! task owns that server's room list: every event produces a new list and the
//! task publishes it as an immutable snapshot to the aggregator.

use crate::error::FeedError;
use futures::future::{self, BoxFuture};
use futures::stream::BoxStream;
use futures::{FutureExt, StreamExt};
use log::{debug, info, warn};
use shared::{Room, RoomEvent, Server};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

pub type EventStream = BoxStream<'static, Result<RoomEvent, FeedError>>;

/// Which rooms a feed reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RoomFilter {
    /// Rooms waiting for players (lobby view).
    Waiting,
    /// Duels in progress (watch view).
    Started,
}

impl RoomFilter {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Started => "started",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Disconnected,
    Connecting,
    Streaming,
    Error,
    Closed,
}

impl fmt::Display for FeedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Streaming => "streaming",
            Self::Error => "error",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Opens room feeds. The aggregator only sees this seam, so tests and other
/// transports can stand in for websockets.
pub trait FeedConnector: Send + Sync {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<EventStream, FeedError>>;
}

/// Room feed over a websocket carrying JSON text messages.
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl FeedConnector for WebSocketConnector {
    fn connect(&self, url: Url) -> BoxFuture<'static, Result<EventStream, FeedError>> {
        let connect_timeout = self.connect_timeout;
        async move {
            let (socket, _) = match timeout(connect_timeout, connect_async(url.as_str())).await {
                Ok(Ok(connected)) => connected,
                Ok(Err(e)) => return Err(FeedError::Connect(e.to_string())),
                Err(_) => return Err(FeedError::Timeout(connect_timeout)),
            };
            debug!("Websocket open: {}", url);

            let events = socket.filter_map(|message| future::ready(decode_message(message)));
            Ok(events.boxed())
        }
        .boxed()
    }
}

/// Maps a websocket frame to a feed event. Frames that are not room events
/// are skipped.
fn decode_message(
    message: Result<Message, tungstenite::Error>,
) -> Option<Result<RoomEvent, FeedError>> {
    match message {
        Ok(Message::Text(text)) => match serde_json::from_str::<RoomEvent>(&text) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                warn!("Skipping malformed room message: {}", e);
                None
            }
        },
        Ok(_) => None,
        Err(e) => Some(Err(FeedError::Transport(e.to_string()))),
    }
}

/// Builds the feed URL for `server`, replacing any `filter` parameter.
pub fn feed_url(server: &Server, filter: RoomFilter) -> Result<Url, FeedError> {
    let base = server
        .url
        .as_deref()
        .ok_or_else(|| FeedError::InvalidUrl(format!("server {} has no feed", server.label())))?;
    let mut url = Url::parse(base).map_err(|e| FeedError::InvalidUrl(format!("{}: {}", base, e)))?;

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| *key != "filter")
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained)
        .append_pair("filter", filter.as_str());

    Ok(url)
}

/// Rooms of one server as folded from its feed.
#[derive(Debug, Clone)]
pub struct RoomList {
    rooms: Arc<[Room]>,
    missed_updates: u64,
}

impl Default for RoomList {
    fn default() -> Self {
        Self {
            rooms: Vec::<Room>::new().into(),
            missed_updates: 0,
        }
    }
}

impl RoomList {
    pub fn rooms(&self) -> &Arc<[Room]> {
        &self.rooms
    }

    /// Updates that named a room this list does not hold.
    pub fn missed_updates(&self) -> u64 {
        self.missed_updates
    }

    /// Folds one event into a new list. `self` is left untouched.
    pub fn apply(&self, event: RoomEvent, server: &Arc<Server>) -> RoomList {
        let rooms: Arc<[Room]> = match event {
            RoomEvent::Init(rooms) => rooms
                .into_iter()
                .map(|room| room.with_server(server))
                .collect(),
            RoomEvent::Create(room) => self
                .rooms
                .iter()
                .cloned()
                .chain(std::iter::once(room.with_server(server)))
                .collect(),
            RoomEvent::Update(patch) => {
                let index = patch.id.as_deref().and_then(|id| {
                    self.rooms
                        .iter()
                        .position(|room| room.id.as_deref() == Some(id))
                });
                match index {
                    Some(index) => self
                        .rooms
                        .iter()
                        .enumerate()
                        .map(|(i, room)| if i == index { patch.apply(room) } else { room.clone() })
                        .collect(),
                    None => {
                        warn!(
                            "Update for unknown room {:?} on {}",
                            patch.id,
                            server.label()
                        );
                        return RoomList {
                            rooms: Arc::clone(&self.rooms),
                            missed_updates: self.missed_updates + 1,
                        };
                    }
                }
            }
            RoomEvent::Delete(id) => self
                .rooms
                .iter()
                .filter(|room| room.id.as_deref() != Some(id.as_str()))
                .cloned()
                .collect(),
        };

        RoomList {
            rooms,
            missed_updates: self.missed_updates,
        }
    }
}

/// What a feed task reports to its aggregator.
#[derive(Debug, Clone)]
pub enum FeedUpdate {
    State(FeedState),
    Rooms(Arc<[Room]>),
    Failed(FeedError),
}

/// Runs one server's feed until it ends, fails, or the aggregator stops
/// listening. Updates are tagged with the feed's position in the
/// subscription.
pub async fn run_feed(
    index: usize,
    server: Arc<Server>,
    url: Url,
    connector: Arc<dyn FeedConnector>,
    updates: mpsc::UnboundedSender<(usize, FeedUpdate)>,
) {
    let send = |update: FeedUpdate| updates.send((index, update)).is_ok();

    info!("Connecting to room feed of {}: {}", server.label(), url);
    if !send(FeedUpdate::State(FeedState::Connecting)) {
        return;
    }

    let mut events = match connector.connect(url).await {
        Ok(events) => events,
        Err(e) => {
            warn!("Room feed of {} failed to connect: {}", server.label(), e);
            send(FeedUpdate::Failed(e));
            send(FeedUpdate::State(FeedState::Error));
            return;
        }
    };

    if !send(FeedUpdate::State(FeedState::Streaming)) {
        return;
    }

    let mut list = RoomList::default();
    while let Some(event) = events.next().await {
        match event {
            Ok(event) => {
                list = list.apply(event, &server);
                if !send(FeedUpdate::Rooms(Arc::clone(list.rooms()))) {
                    return;
                }
            }
            Err(e) => {
                warn!("Room feed of {} failed: {}", server.label(), e);
                send(FeedUpdate::Failed(e));
                send(FeedUpdate::State(FeedState::Error));
                return;
            }
        }
    }

    if list.missed_updates() > 0 {
        info!(
            "Room feed of {} closed, {} updates referenced unknown rooms",
            server.label(),
            list.missed_updates()
        );
    } else {
        info!("Room feed of {} closed", server.label());
    }
    send(FeedUpdate::State(FeedState::Closed));
}
