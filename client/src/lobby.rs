//! Lobby service: the signed-in user, the server selection and every action
//! that ends in the native client.

use crate::aggregator::{self, RoomListAggregator, RoomListHandle};
use crate::bridge::Launcher;
use crate::catalog::ServerCatalog;
use crate::error::LobbyError;
use crate::feed::{FeedConnector, RoomFilter};
use log::{info, warn};
use rand::seq::SliceRandom;
use shared::token::{create_room_token, join_password_token, join_room_token, windbot_token};
use shared::{user_secret, MatchResponse, Room, Server};
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub username: String,
    /// Platform account id, the source of the token secret.
    pub external_id: u64,
}

impl User {
    pub fn secret(&self) -> u16 {
        user_secret(self.external_id)
    }
}

/// Server flags the selectable list can be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ServerField {
    Url,
    Custom,
    Replay,
    Hidden,
    Windbot,
}

impl ServerField {
    pub fn is_set(self, server: &Server) -> bool {
        match self {
            Self::Url => server.url.is_some(),
            Self::Custom => server.custom,
            Self::Replay => server.replay,
            Self::Hidden => server.hidden,
            Self::Windbot => !server.windbots().is_empty(),
        }
    }
}

pub struct Lobby {
    user: User,
    catalog: watch::Sender<Arc<ServerCatalog>>,
    selectable: Vec<Arc<Server>>,
    selection: watch::Sender<Option<Arc<Server>>>,
    launcher: Launcher,
    connector: Arc<dyn FeedConnector>,
}

impl Lobby {
    /// Creates the lobby and selects the first selectable server.
    pub fn new(
        user: User,
        catalog: ServerCatalog,
        launcher: Launcher,
        connector: Arc<dyn FeedConnector>,
    ) -> Self {
        let (selection, _) = watch::channel(None);
        let (catalog, _) = watch::channel(Arc::new(catalog));
        let mut lobby = Self {
            user,
            catalog,
            selectable: Vec::new(),
            selection,
            launcher,
            connector,
        };
        lobby.reload_selectable_servers(|_| true);
        lobby
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn catalog(&self) -> Arc<ServerCatalog> {
        Arc::clone(&self.catalog.borrow())
    }

    /// Swaps in a freshly fetched catalog. Running room lists resubscribe
    /// against it.
    pub fn replace_catalog(&mut self, catalog: ServerCatalog) {
        info!("Server catalog replaced ({} servers)", catalog.len());
        self.catalog.send_replace(Arc::new(catalog));
        self.reload_selectable_servers(|_| true);
    }

    pub fn selectable_servers(&self) -> &[Arc<Server>] {
        &self.selectable
    }

    /// Recomputes the selectable servers. A selection that is no longer
    /// selectable moves to the first selectable server, or to none.
    pub fn reload_selectable_servers<F>(&mut self, condition: F)
    where
        F: Fn(&Server) -> bool,
    {
        self.selectable = self.catalog().selectable(condition);

        let still_selectable = self.current_server().map_or(false, |current| {
            self.selectable.iter().any(|server| server.is_same(&current))
        });
        if !still_selectable {
            let first = self.selectable.first().cloned();
            match &first {
                Some(server) => info!("Selecting server {}", server.label()),
                None => warn!("No selectable servers"),
            }
            self.selection.send_replace(first);
        }
    }

    /// Narrows the selectable servers to those with any of `fields` set.
    pub fn reload_servers_with(&mut self, fields: &[ServerField]) {
        let fields = fields.to_vec();
        self.reload_selectable_servers(move |server| {
            fields.iter().any(|field| field.is_set(server))
        });
    }

    pub fn current_server(&self) -> Option<Arc<Server>> {
        self.selection.borrow().clone()
    }

    fn require_current_server(&self) -> Result<Arc<Server>, LobbyError> {
        self.current_server().ok_or(LobbyError::NoServerSelected)
    }

    /// Selects `server`. Running room lists resubscribe even when the same
    /// server is selected again.
    pub fn select_server(&self, server: Arc<Server>) {
        info!("Selecting server {}", server.label());
        self.selection.send_replace(Some(server));
    }

    pub fn select_server_by_id(&self, id: &str) -> Result<Arc<Server>, LobbyError> {
        let server = self
            .catalog()
            .find(id)
            .ok_or_else(|| LobbyError::UnknownServer(id.to_string()))?;
        self.select_server(Arc::clone(&server));
        Ok(server)
    }

    pub fn subscribe_selection(&self) -> watch::Receiver<Option<Arc<Server>>> {
        self.selection.subscribe()
    }

    /// Starts a live room list that follows the server selection.
    pub fn room_list(&self, filter: RoomFilter) -> RoomListHandle {
        RoomListAggregator::new(
            self.catalog.subscribe(),
            Arc::clone(&self.connector),
            filter,
        )
        .connect(self.subscribe_selection())
    }

    pub fn is_room_available_to_display(&self, room: &Room) -> bool {
        self.current_server()
            .map_or(false, |current| aggregator::is_room_available_to_display(room, &current))
    }

    /// Creates `room` on the current server. Returns the token handed to the
    /// native client.
    pub fn create_room(&self, room: &Room, host_password: &str) -> Result<String, LobbyError> {
        let server = self.require_current_server()?;
        let title = room.title.as_deref().unwrap_or_default();
        let token = create_room_token(
            &room.options,
            room.is_private(),
            title,
            host_password,
            self.user.secret(),
        );
        self.join(&token, &server);
        Ok(token)
    }

    /// Joins an existing room on the server it was listed by.
    pub fn join_room(&self, room: &Room) -> Result<String, LobbyError> {
        let id = room.id.as_deref().ok_or(LobbyError::MissingRoomId)?;
        let server = room.server.as_ref().ok_or(LobbyError::MissingRoomServer)?;
        let token = join_room_token(id, self.user.secret());
        self.join(&token, server);
        Ok(token)
    }

    /// Joins a private room on the current server by its password.
    pub fn join_private(&self, password: &str) -> Result<String, LobbyError> {
        let server = self.require_current_server()?;
        let token = join_password_token(password, self.user.secret());
        self.join(&token, &server);
        Ok(token)
    }

    /// Duels an AI opponent on the current server, a random one when `name`
    /// is not given.
    pub fn join_windbot(&self, name: Option<&str>) -> Result<String, LobbyError> {
        let server = self.require_current_server()?;
        let name = match name {
            Some(name) => name.to_string(),
            None => server
                .windbots()
                .choose(&mut rand::thread_rng())
                .cloned()
                .ok_or_else(|| LobbyError::NoWindbot(server.label().to_string()))?,
        };
        let token = windbot_token(&name);
        self.join(&token, &server);
        Ok(token)
    }

    /// Joins the duel the arena matchmaker assigned.
    pub fn join_match(&self, response: &MatchResponse) -> bool {
        self.launcher.join(
            &response.address,
            response.port,
            &self.user.username,
            &response.password,
        )
    }

    pub fn join(&self, token: &str, server: &Server) -> bool {
        self.launcher
            .join(&server.address, server.port, &self.user.username, token)
    }

    pub fn edit_deck(&self, deck: Option<&str>) -> bool {
        self.launcher.edit_deck(deck)
    }

    pub fn watch_replay(&self) -> bool {
        self.launcher.watch_replay()
    }

    pub fn single_mode(&self) -> bool {
        self.launcher.puzzle_mode()
    }

    pub fn open_drawer(&self) -> bool {
        self.launcher.open_drawer()
    }

    pub fn back_home(&self) -> bool {
        self.launcher.back_home()
    }

    pub fn share(&self, text: &str) -> bool {
        self.launcher.share(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Diagnostic, DiagnosticSink, NativeBridge, UnavailableBridge};
    use crate::error::BridgeError;
    use crate::feed::WebSocketConnector;
    use shared::{decode_token, TokenKind};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, u16, String, String)>>);

    impl NativeBridge for Recorder {
        fn join(&self, address: &str, port: u16, username: &str, token: &str) -> Result<(), BridgeError> {
            self.0.lock().unwrap().push((
                address.to_string(),
                port,
                username.to_string(),
                token.to_string(),
            ));
            Ok(())
        }

        fn edit_deck(&self, _: Option<&str>) -> Result<(), BridgeError> {
            Ok(())
        }

        fn watch_replay(&self) -> Result<(), BridgeError> {
            Ok(())
        }

        fn puzzle_mode(&self) -> Result<(), BridgeError> {
            Ok(())
        }

        fn open_drawer(&self) -> Result<(), BridgeError> {
            Ok(())
        }

        fn back_home(&self) -> Result<(), BridgeError> {
            Ok(())
        }

        fn share(&self, _: &str) -> Result<(), BridgeError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<Diagnostic>>);

    impl DiagnosticSink for Collect {
        fn report(&self, diagnostic: Diagnostic) {
            self.0.lock().unwrap().push(diagnostic);
        }
    }

    fn server(id: &str, port: u16) -> Server {
        Server {
            id: Some(id.to_string()),
            url: Some(format!("ws://{}.example/", id)),
            address: format!("{}.example", id),
            port,
            custom: true,
            ..Server::default()
        }
    }

    fn catalog() -> ServerCatalog {
        let mut hidden = server("hidden", 1);
        hidden.hidden = true;
        let mut replay = server("replay", 7922);
        replay.custom = false;
        replay.replay = true;
        replay.windbot = Some(vec!["Joey".to_string()]);
        ServerCatalog::new(vec![hidden, server("mycard", 7911), replay])
    }

    fn lobby_with(bridge: Arc<dyn NativeBridge>, sink: Arc<dyn DiagnosticSink>) -> Lobby {
        let user = User {
            username: "yugi".to_string(),
            external_id: 12345,
        };
        let connector = Arc::new(WebSocketConnector::new(Duration::from_secs(1)));
        Lobby::new(user, catalog(), Launcher::new(bridge, sink), connector)
    }

    #[test]
    fn test_first_selectable_server_is_selected() {
        let lobby = lobby_with(Arc::new(Recorder::default()), Arc::new(Collect::default()));
        assert_eq!(lobby.selectable_servers().len(), 2);
        assert_eq!(lobby.current_server().unwrap().id.as_deref(), Some("mycard"));
    }

    #[test]
    fn test_reload_keeps_or_moves_selection() {
        let mut lobby = lobby_with(Arc::new(Recorder::default()), Arc::new(Collect::default()));

        lobby.reload_servers_with(&[ServerField::Custom]);
        assert_eq!(lobby.current_server().unwrap().id.as_deref(), Some("mycard"));

        lobby.reload_servers_with(&[ServerField::Replay]);
        assert_eq!(lobby.current_server().unwrap().id.as_deref(), Some("replay"));

        lobby.reload_servers_with(&[ServerField::Hidden]);
        assert!(lobby.selectable_servers().is_empty());
        assert!(lobby.current_server().is_none());
    }

    #[test]
    fn test_replace_catalog_moves_missing_selection() {
        let mut lobby = lobby_with(Arc::new(Recorder::default()), Arc::new(Collect::default()));
        let selection = lobby.subscribe_selection();

        lobby.replace_catalog(ServerCatalog::new(vec![server("mycard", 7911), server("new", 7933)]));
        assert!(!selection.has_changed().unwrap());
        assert!(lobby.catalog().find("new").is_some());

        lobby.replace_catalog(ServerCatalog::new(vec![server("new", 7933)]));
        assert!(selection.has_changed().unwrap());
        assert_eq!(lobby.current_server().unwrap().id.as_deref(), Some("new"));
        assert!(lobby.select_server_by_id("mycard").is_err());
    }

    #[test]
    fn test_select_unknown_server() {
        let lobby = lobby_with(Arc::new(Recorder::default()), Arc::new(Collect::default()));
        assert!(matches!(
            lobby.select_server_by_id("nope"),
            Err(LobbyError::UnknownServer(_))
        ));
    }

    #[test]
    fn test_create_room_joins_current_server() {
        let recorder = Arc::new(Recorder::default());
        let lobby = lobby_with(recorder.clone(), Arc::new(Collect::default()));

        let room = Room {
            title: Some("my room".to_string()),
            ..Room::default()
        };
        let token = lobby.create_room(&room, "").unwrap();

        let joins = recorder.0.lock().unwrap();
        assert_eq!(joins.len(), 1);
        assert_eq!(joins[0].0, "mycard.example");
        assert_eq!(joins[0].1, 7911);
        assert_eq!(joins[0].2, "yugi");
        assert_eq!(joins[0].3, token);

        let decoded = decode_token(&token, lobby.user().secret()).unwrap();
        assert_eq!(decoded.kind(), Some(TokenKind::PublicCreate));
        assert_eq!(decoded.tail, "my\u{feff}room");
    }

    #[test]
    fn test_join_room_uses_room_server() {
        let recorder = Arc::new(Recorder::default());
        let lobby = lobby_with(recorder.clone(), Arc::new(Collect::default()));
        let replay = lobby.catalog().find("replay").unwrap();

        let room = Room {
            id: Some("r1".to_string()),
            ..Room::default()
        }
        .with_server(&replay);
        let token = lobby.join_room(&room).unwrap();

        assert!(token.ends_with("r1"));
        assert_eq!(recorder.0.lock().unwrap()[0].1, 7922);

        let detached = Room {
            id: Some("r2".to_string()),
            ..Room::default()
        };
        assert!(matches!(
            lobby.join_room(&detached),
            Err(LobbyError::MissingRoomServer)
        ));
        assert!(matches!(
            lobby.join_room(&Room::default()),
            Err(LobbyError::MissingRoomId)
        ));
    }

    #[test]
    fn test_join_windbot() {
        let recorder = Arc::new(Recorder::default());
        let lobby = lobby_with(recorder.clone(), Arc::new(Collect::default()));

        assert!(matches!(
            lobby.join_windbot(None),
            Err(LobbyError::NoWindbot(_))
        ));
        assert_eq!(lobby.join_windbot(Some("Kaiba")).unwrap(), "AI#Kaiba");

        lobby.select_server_by_id("replay").unwrap();
        assert_eq!(lobby.join_windbot(None).unwrap(), "AI#Joey");
        assert_eq!(recorder.0.lock().unwrap()[1].1, 7922);
    }

    #[test]
    fn test_join_private_and_match() {
        let recorder = Arc::new(Recorder::default());
        let lobby = lobby_with(recorder.clone(), Arc::new(Collect::default()));

        let token = lobby.join_private("secret pass").unwrap();
        let decoded = decode_token(&token, lobby.user().secret()).unwrap();
        assert_eq!(decoded.kind(), Some(TokenKind::JoinPassword));
        assert_eq!(decoded.tail, "secret\u{feff}pass");

        let response = MatchResponse {
            password: "M#123".to_string(),
            address: "arena.example".to_string(),
            port: 8911,
        };
        assert!(lobby.join_match(&response));

        let joins = recorder.0.lock().unwrap();
        assert_eq!(joins[1], ("arena.example".to_string(), 8911, "yugi".to_string(), "M#123".to_string()));
    }

    #[test]
    fn test_unavailable_native_client_reports_diagnostic() {
        let sink = Arc::new(Collect::default());
        let lobby = lobby_with(Arc::new(UnavailableBridge), sink.clone());

        let token = lobby.join_private("pw").unwrap();
        assert!(!lobby.single_mode());

        let reported = sink.0.lock().unwrap();
        assert_eq!(reported.len(), 2);
        assert_eq!(reported[0].method, "join");
        assert_eq!(reported[0].params[3], serde_json::json!(token));
        assert_eq!(reported[1].method, "puzzle_mode");
    }

    #[test]
    fn test_is_room_available_to_display() {
        let lobby = lobby_with(Arc::new(Recorder::default()), Arc::new(Collect::default()));
        let mycard = lobby.catalog().find("mycard").unwrap();
        let replay = lobby.catalog().find("replay").unwrap();

        assert!(lobby.is_room_available_to_display(&Room::default().with_server(&mycard)));
        assert!(!lobby.is_room_available_to_display(&Room::default().with_server(&replay)));
    }
}
