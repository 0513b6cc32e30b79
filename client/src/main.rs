use clap::{Parser, Subcommand};
use client::aggregator::RoomListSignal;
use client::bridge::Launcher;
use client::catalog::ServerCatalog;
use client::config::{LobbyConfig, DEFAULT_APPS_URL, DEFAULT_APP_ID, DEFAULT_CONNECT_TIMEOUT_MS};
use client::feed::{RoomFilter, WebSocketConnector};
use client::lobby::{Lobby, ServerField, User};
use log::{error, info, warn};
use shared::{decode_token, user_secret, Room, Ruleset};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Platform app listing the server catalog is read from
    #[arg(long, default_value = DEFAULT_APPS_URL)]
    apps_url: String,

    /// App whose servers are used
    #[arg(long, default_value = DEFAULT_APP_ID)]
    app_id: String,

    /// Read the app listing from a file instead of fetching it
    #[arg(short = 'c', long)]
    catalog: Option<PathBuf>,

    /// Platform username passed to the native client
    #[arg(short = 'u', long)]
    username: String,

    /// Platform account id, keys the options token
    #[arg(short = 'e', long)]
    external_id: u64,

    /// Server to select instead of the first selectable one
    #[arg(short = 's', long)]
    server: Option<String>,

    /// Only offer servers with any of these flags set
    #[arg(long, value_enum, value_delimiter = ',')]
    with: Vec<ServerField>,

    /// Native game client executable
    #[arg(short = 'n', long)]
    native: Option<PathBuf>,

    /// Room feed connect timeout in milliseconds
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT_MS)]
    connect_timeout_ms: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct RulesetArgs {
    #[arg(long)]
    mode: Option<u32>,
    #[arg(long)]
    rule: Option<u32>,
    #[arg(long)]
    start_lp: Option<u32>,
    #[arg(long)]
    start_hand: Option<u32>,
    #[arg(long)]
    draw_count: Option<u32>,
    #[arg(long)]
    duel_rule: Option<u32>,
    #[arg(long)]
    no_check_deck: bool,
    #[arg(long)]
    no_shuffle_deck: bool,
    #[arg(long)]
    auto_death: bool,
}

impl RulesetArgs {
    fn into_ruleset(self) -> Ruleset {
        let defaults = Ruleset::default();
        Ruleset {
            mode: self.mode.unwrap_or(defaults.mode),
            rule: self.rule.unwrap_or(defaults.rule),
            start_lp: self.start_lp.unwrap_or(defaults.start_lp),
            start_hand: self.start_hand.unwrap_or(defaults.start_hand),
            draw_count: self.draw_count.unwrap_or(defaults.draw_count),
            duel_rule: self.duel_rule.unwrap_or(defaults.duel_rule),
            no_check_deck: self.no_check_deck,
            no_shuffle_deck: self.no_shuffle_deck,
            auto_death: self.auto_death,
            ..defaults
        }
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode an options token with this user's secret
    Decode { token: String },
    #[command(flatten)]
    Lobby(LobbyCommand),
}

/// Commands that run against the server catalog.
#[derive(Subcommand, Debug)]
enum LobbyCommand {
    /// List the selectable servers
    Servers,
    /// Follow the live room list until Ctrl+C
    Rooms {
        #[arg(short, long, value_enum, default_value = "waiting")]
        filter: RoomFilter,
    },
    /// Create a room on the selected server
    Create {
        #[arg(short, long)]
        title: String,
        /// Host password; makes the room private
        #[arg(short, long)]
        password: Option<String>,
        #[command(flatten)]
        ruleset: RulesetArgs,
    },
    /// Join a room of the selected server by id
    Join { room_id: String },
    /// Join a private room by its password
    JoinPrivate { password: String },
    /// Duel an AI opponent, a random one unless named
    Windbot { name: Option<String> },
    /// Open the deck editor
    Deck { deck: Option<String> },
    /// Open the replay viewer
    Replay,
    /// Start single-player puzzle mode
    Puzzle,
    /// Share text through the native client
    Share { text: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let command = match args.command {
        Command::Decode { token } => {
            let decoded = decode_token(&token, user_secret(args.external_id))?;
            println!("marker: {}", decoded.marker);
            println!("options: {}", serde_json::to_string(&decoded.ruleset)?);
            println!("text: {}", decoded.tail);
            return Ok(());
        }
        Command::Lobby(command) => command,
    };

    let config = LobbyConfig {
        apps_url: args.apps_url,
        app_id: args.app_id,
        catalog_path: args.catalog,
        connect_timeout: Duration::from_millis(args.connect_timeout_ms),
        native_client: args.native,
    };

    let catalog = ServerCatalog::obtain(&config).await?;
    info!("Catalog lists {} servers", catalog.len());

    let user = User {
        username: args.username,
        external_id: args.external_id,
    };
    let mut lobby = Lobby::new(
        user,
        catalog,
        Launcher::for_native_client(config.native_client.clone()),
        Arc::new(WebSocketConnector::new(config.connect_timeout)),
    );

    if !args.with.is_empty() {
        lobby.reload_servers_with(&args.with);
    }
    if let Some(id) = &args.server {
        lobby.select_server_by_id(id)?;
    }

    match command {
        LobbyCommand::Servers => {
            let current = lobby.current_server();
            for server in lobby.selectable_servers() {
                let marker = match &current {
                    Some(current) if current.is_same(server) => "*",
                    _ => " ",
                };
                println!(
                    "{} {:<16} {:<24} {}:{}",
                    marker,
                    server.id.as_deref().unwrap_or("-"),
                    server.name.as_deref().unwrap_or(""),
                    server.address,
                    server.port
                );
            }
        }
        LobbyCommand::Rooms { filter } => follow_rooms(&lobby, filter).await,
        LobbyCommand::Create {
            title,
            password,
            ruleset,
        } => {
            let room = Room {
                title: Some(title),
                private: Some(password.is_some()),
                options: ruleset.into_ruleset(),
                ..Room::default()
            };
            let token = lobby.create_room(&room, password.as_deref().unwrap_or_default())?;
            info!("Create token: {}", token);
        }
        LobbyCommand::Join { room_id } => {
            let server = lobby
                .current_server()
                .ok_or(client::error::LobbyError::NoServerSelected)?;
            let room = Room {
                id: Some(room_id),
                ..Room::default()
            }
            .with_server(&server);
            lobby.join_room(&room)?;
        }
        LobbyCommand::JoinPrivate { password } => {
            lobby.join_private(&password)?;
        }
        LobbyCommand::Windbot { name } => {
            let token = lobby.join_windbot(name.as_deref())?;
            info!("Windbot token: {}", token);
        }
        LobbyCommand::Deck { deck } => {
            lobby.edit_deck(deck.as_deref());
        }
        LobbyCommand::Replay => {
            lobby.watch_replay();
        }
        LobbyCommand::Puzzle => {
            lobby.single_mode();
        }
        LobbyCommand::Share { text } => {
            lobby.share(&text);
        }
    }

    Ok(())
}

/// Prints the live room list until Ctrl+C.
async fn follow_rooms(lobby: &Lobby, filter: RoomFilter) {
    let mut rooms = lobby.room_list(filter);

    loop {
        tokio::select! {
            signal = rooms.recv() => match signal {
                Some(RoomListSignal::Loading(true)) => println!("Loading..."),
                Some(RoomListSignal::Loading(false)) => {}
                Some(RoomListSignal::Empty(true)) => println!("No rooms"),
                Some(RoomListSignal::Empty(false)) => {}
                Some(RoomListSignal::Rooms(list)) => print_rooms(&list),
                Some(RoomListSignal::Feed { server, state }) => info!("Feed {}: {}", server, state),
                Some(RoomListSignal::Error { server, error }) => {
                    warn!("Rooms of {} unavailable: {}", server, error)
                }
                None => {
                    error!("Room list stopped");
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                println!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }
}

fn print_rooms(rooms: &[Room]) {
    println!("--- {} room(s)", rooms.len());
    for room in rooms {
        let players: Vec<&str> = room.users.iter().map(|u| u.username.as_str()).collect();
        println!(
            "{:<10} {:<9} {:<24} {:>6} {}",
            room.arena.as_deref().unwrap_or(mode_name(room.options.mode)),
            room.id.as_deref().unwrap_or("-"),
            room.title.as_deref().unwrap_or(""),
            room.options.effective_start_lp(),
            players.join(", ")
        );
    }
}

fn mode_name(mode: u32) -> &'static str {
    match mode {
        0 => "single",
        1 => "match",
        2 => "tag",
        _ => "other",
    }
}
