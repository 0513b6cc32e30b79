//! Live room list merged from every participating server's feed
//!
//! The aggregator watches the selected server. For each selection it opens
//! the feeds of all participating servers, keeps the latest snapshot of
//! each, and republishes the merged, filtered and sorted list whenever any
//! feed emits. A new selection or a replaced catalog aborts every feed of
//! the previous subscription before the new feeds are opened. While nothing
//! is selected the list is empty.

use crate::catalog::ServerCatalog;
use crate::error::FeedError;
use crate::feed::{feed_url, run_feed, FeedConnector, FeedState, FeedUpdate, RoomFilter};
use log::{debug, info, warn};
use shared::{Room, Server};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinHandle, JoinSet};

/// Observable output of a running aggregator.
#[derive(Debug, Clone)]
pub enum RoomListSignal {
    /// `true` when a subscription starts, `false` once its first list is out.
    Loading(bool),
    /// Whether the displayed list is empty. Only sent when it changes.
    Empty(bool),
    Rooms(Vec<Room>),
    Feed { server: String, state: FeedState },
    /// A server's feed failed. Its rooms drop out, other servers keep going.
    Error { server: String, error: FeedError },
}

/// Whether `server` feeds the room list while `selected` is selected.
pub fn participates(server: &Server, selected: &Server) -> bool {
    server.has_room_feed()
        && (server.is_same(selected)
            || (selected.is_arena_canonical() && server.in_arena_family()))
}

/// Arena rooms are shown on the arena server, other rooms only on their own.
pub fn is_room_available_to_display(room: &Room, selected: &Server) -> bool {
    (room.arena.is_some() && selected.is_arena_canonical()) || room.belongs_to(selected)
}

/// Concatenates per-server snapshots in subscription order.
pub fn merge(lists: &[Option<Arc<[Room]>>]) -> Vec<Room> {
    lists
        .iter()
        .flatten()
        .flat_map(|rooms| rooms.iter().cloned())
        .collect()
}

/// Keeps displayable rooms and orders them by [`Room::sort_key`], keeping
/// feed order among equal keys.
pub fn arrange(rooms: Vec<Room>, selected: &Server) -> Vec<Room> {
    let mut rooms: Vec<Room> = rooms
        .into_iter()
        .filter(|room| is_room_available_to_display(room, selected))
        .collect();
    rooms.sort_by_key(Room::sort_key);
    rooms
}

pub struct RoomListAggregator {
    catalog: watch::Receiver<Arc<ServerCatalog>>,
    connector: Arc<dyn FeedConnector>,
    filter: RoomFilter,
}

impl RoomListAggregator {
    /// `catalog` is read again for every subscription, so a replaced catalog
    /// takes effect on the next selection.
    pub fn new(
        catalog: watch::Receiver<Arc<ServerCatalog>>,
        connector: Arc<dyn FeedConnector>,
        filter: RoomFilter,
    ) -> Self {
        Self {
            catalog,
            connector,
            filter,
        }
    }

    /// Servers whose feeds make up the list for `selected`, in catalog order.
    pub fn participants(&self, selected: &Server) -> Vec<Arc<Server>> {
        participants_in(&self.catalog.borrow(), selected)
    }

    /// Starts following `selection`. The aggregator runs until the returned
    /// handle is dropped.
    pub fn connect(self, selection: watch::Receiver<Option<Arc<Server>>>) -> RoomListHandle {
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(selection, signal_tx));
        RoomListHandle {
            signals: signal_rx,
            task,
        }
    }

    async fn run(
        self,
        mut selection: watch::Receiver<Option<Arc<Server>>>,
        signals: mpsc::UnboundedSender<RoomListSignal>,
    ) {
        let mut catalog = self.catalog.clone();
        let mut loading = false;
        let mut cleared = false;

        loop {
            let selected = selection.borrow_and_update().clone();
            let next = match selected {
                Some(selected) => {
                    cleared = false;
                    self.follow(selected, &mut catalog, &mut selection, &signals, &mut loading)
                        .await
                }
                None => {
                    if !cleared {
                        cleared = true;
                        if !publish_cleared(&signals, loading) {
                            return;
                        }
                        loading = false;
                    }
                    debug!("No server selected, waiting for a selection");
                    if selection.changed().await.is_ok() {
                        Follow::Reselect
                    } else {
                        Follow::Stop
                    }
                }
            };

            if next == Follow::Stop {
                debug!("Room list aggregator stopped");
                return;
            }
        }
    }

    /// Streams the list for one selection until the selection or the catalog
    /// changes. `loading` is left set when no list went out.
    async fn follow(
        &self,
        selected: Arc<Server>,
        catalog: &mut watch::Receiver<Arc<ServerCatalog>>,
        selection: &mut watch::Receiver<Option<Arc<Server>>>,
        signals: &mpsc::UnboundedSender<RoomListSignal>,
        loading: &mut bool,
    ) -> Follow {
        let current = catalog.borrow_and_update().clone();
        let participants = participants_in(&current, &selected);
        info!(
            "Subscribing to {} room feed(s) for {}",
            participants.len(),
            selected.label()
        );

        let mut view = View::new(Arc::clone(&selected), participants.len());
        let next = self
            .stream(&participants, &mut view, catalog, selection, signals)
            .await;
        *loading = view.loading;
        next
    }

    async fn stream(
        &self,
        participants: &[Arc<Server>],
        view: &mut View,
        catalog: &mut watch::Receiver<Arc<ServerCatalog>>,
        selection: &mut watch::Receiver<Option<Arc<Server>>>,
        signals: &mpsc::UnboundedSender<RoomListSignal>,
    ) -> Follow {
        if !view.send(signals, RoomListSignal::Loading(true)) {
            return Follow::Stop;
        }

        let (update_tx, mut update_rx) = mpsc::unbounded_channel();
        let mut feeds = JoinSet::new();
        for (index, server) in participants.iter().enumerate() {
            match feed_url(server, self.filter) {
                Ok(url) => {
                    feeds.spawn(run_feed(
                        index,
                        Arc::clone(server),
                        url,
                        Arc::clone(&self.connector),
                        update_tx.clone(),
                    ));
                }
                Err(error) => {
                    warn!("Skipping room feed of {}: {}", server.label(), error);
                    view.latest[index] = Some(empty_snapshot());
                    let signal = RoomListSignal::Error {
                        server: server.label().to_string(),
                        error,
                    };
                    if !view.send(signals, signal) {
                        return Follow::Stop;
                    }
                }
            }
        }
        drop(update_tx);

        if view.is_complete() && !view.publish(signals) {
            return Follow::Stop;
        }

        let mut selection_open = true;
        let mut catalog_open = true;
        let mut feeds_open = true;
        loop {
            if !selection_open && !feeds_open {
                return Follow::Stop;
            }

            tokio::select! {
                biased;

                changed = selection.changed(), if selection_open => {
                    if changed.is_ok() {
                        info!("Server selection changed, dropping feeds of {}", view.selected.label());
                        return disconnect(feeds, participants, view, signals);
                    }
                    selection_open = false;
                }
                changed = catalog.changed(), if catalog_open => {
                    if changed.is_ok() {
                        info!("Server catalog replaced, resubscribing {}", view.selected.label());
                        return disconnect(feeds, participants, view, signals);
                    }
                    catalog_open = false;
                }
                update = update_rx.recv(), if feeds_open => {
                    match update {
                        Some((index, update)) => {
                            let server = participants[index].label();
                            if !view.apply(server, index, update, signals) {
                                return Follow::Stop;
                            }
                        }
                        None => {
                            debug!("All room feeds of {} ended", view.selected.label());
                            feeds_open = false;
                        }
                    }
                }
            }
        }
    }
}

/// Servers of `catalog` whose feeds make up the list for `selected`.
fn participants_in(catalog: &ServerCatalog, selected: &Server) -> Vec<Arc<Server>> {
    catalog
        .servers()
        .iter()
        .filter(|server| participates(server, selected))
        .cloned()
        .collect()
}

/// Tears down every feed of a subscription. Aborting the tasks and dropping
/// the update receiver cuts off anything the old feeds still had in flight.
fn disconnect(
    mut feeds: JoinSet<()>,
    participants: &[Arc<Server>],
    view: &View,
    signals: &mpsc::UnboundedSender<RoomListSignal>,
) -> Follow {
    feeds.abort_all();
    for server in participants {
        let signal = RoomListSignal::Feed {
            server: server.label().to_string(),
            state: FeedState::Disconnected,
        };
        if !view.send(signals, signal) {
            return Follow::Stop;
        }
    }
    Follow::Reselect
}

/// Shown while no server is selected: nothing is loading and the list is
/// empty.
fn publish_cleared(signals: &mpsc::UnboundedSender<RoomListSignal>, loading: bool) -> bool {
    if loading && signals.send(RoomListSignal::Loading(false)).is_err() {
        return false;
    }
    signals.send(RoomListSignal::Empty(true)).is_ok()
        && signals.send(RoomListSignal::Rooms(Vec::new())).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Follow {
    Reselect,
    Stop,
}

fn empty_snapshot() -> Arc<[Room]> {
    Vec::<Room>::new().into()
}

/// Combine-latest state of one subscription.
struct View {
    selected: Arc<Server>,
    latest: Vec<Option<Arc<[Room]>>>,
    loading: bool,
    last_empty: Option<bool>,
}

impl View {
    fn new(selected: Arc<Server>, feeds: usize) -> Self {
        Self {
            selected,
            latest: vec![None; feeds],
            loading: true,
            last_empty: None,
        }
    }

    /// Every feed has produced a snapshot or dropped out.
    fn is_complete(&self) -> bool {
        self.latest.iter().all(Option::is_some)
    }

    fn send(&self, signals: &mpsc::UnboundedSender<RoomListSignal>, signal: RoomListSignal) -> bool {
        signals.send(signal).is_ok()
    }

    fn apply(
        &mut self,
        server: &str,
        index: usize,
        update: FeedUpdate,
        signals: &mpsc::UnboundedSender<RoomListSignal>,
    ) -> bool {
        match update {
            FeedUpdate::State(state) => {
                debug!("Room feed of {} is {}", server, state);
                // a feed that closes before its first message counts as empty
                if state == FeedState::Closed && self.latest[index].is_none() {
                    self.latest[index] = Some(empty_snapshot());
                    if self.is_complete() && !self.publish(signals) {
                        return false;
                    }
                }
                self.send(
                    signals,
                    RoomListSignal::Feed {
                        server: server.to_string(),
                        state,
                    },
                )
            }
            FeedUpdate::Rooms(rooms) => {
                self.latest[index] = Some(rooms);
                !self.is_complete() || self.publish(signals)
            }
            FeedUpdate::Failed(error) => {
                self.latest[index] = Some(empty_snapshot());
                let signal = RoomListSignal::Error {
                    server: server.to_string(),
                    error,
                };
                self.send(signals, signal) && (!self.is_complete() || self.publish(signals))
            }
        }
    }

    fn publish(&mut self, signals: &mpsc::UnboundedSender<RoomListSignal>) -> bool {
        let rooms = arrange(merge(&self.latest), &self.selected);

        if self.loading {
            self.loading = false;
            if !self.send(signals, RoomListSignal::Loading(false)) {
                return false;
            }
        }

        let empty = rooms.is_empty();
        if self.last_empty != Some(empty) {
            self.last_empty = Some(empty);
            if !self.send(signals, RoomListSignal::Empty(empty)) {
                return false;
            }
        }

        self.send(signals, RoomListSignal::Rooms(rooms))
    }
}

/// Receiving end of a running aggregator. Dropping it stops the aggregator
/// and every feed it opened.
pub struct RoomListHandle {
    signals: mpsc::UnboundedReceiver<RoomListSignal>,
    task: JoinHandle<()>,
}

impl RoomListHandle {
    pub async fn recv(&mut self) -> Option<RoomListSignal> {
        self.signals.recv().await
    }
}

impl Drop for RoomListHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
