//! # Lobby Client Library
//!
//! Client-side core of the card-game lobby: it knows the platform's servers,
//! follows their live room feeds and hands the native game client everything
//! it needs to create or join a duel.
//!
//! ## Architecture Overview
//!
//! ### Live Room List
//! Every server that hosts custom rooms publishes a websocket feed of room
//! events (`init`, `create`, `update`, `delete`). The client opens one feed
//! per participating server, folds each feed into that server's room list and
//! merges the lists into a single view whenever any feed emits. Selecting
//! another server tears down every open feed before the new ones start, so a
//! stale feed can never touch the current view.
//!
//! ### Failure Isolation
//! A feed that cannot connect or drops mid-stream only removes its own
//! server's rooms. The failure is published as a signal and the remaining
//! servers keep streaming.
//!
//! ### Native Handoff
//! Creating or joining a room produces an options token (see
//! [`shared::token`]) that is passed to the native client together with the
//! server address. Bridge failures never propagate: they are logged and
//! reported as a diagnostic the operator can act on.
//!
//! ## Module Organization
//!
//! ### Catalog Module (`catalog`)
//! - Fetching the server list from the platform's app listing
//! - Loading the same listing from disk
//! - Selectable-server filtering
//!
//! ### Feed Module (`feed`)
//! - The `FeedConnector` seam and its websocket implementation
//! - Persistent per-server room folding
//! - Feed URL construction
//!
//! ### Aggregator Module (`aggregator`)
//! - Participation and display filters
//! - Combine-latest merge and stable ordering
//! - Loading, empty and error signaling
//!
//! ### Bridge Module (`bridge`)
//! - The `NativeBridge` capability trait
//! - Process-based bridge and diagnostic reporting
//!
//! ### Lobby Module (`lobby`)
//! - Server selection state
//! - Room creation, joining, AI duels and arena matches
//!
//! ## Usage Example
//!
//! ```no_run
//! use client::bridge::Launcher;
//! use client::catalog::ServerCatalog;
//! use client::config::LobbyConfig;
//! use client::feed::{RoomFilter, WebSocketConnector};
//! use client::lobby::{Lobby, User};
//! use std::sync::Arc;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LobbyConfig::default();
//! let catalog = ServerCatalog::obtain(&config).await?;
//! let user = User { username: "yugi".to_string(), external_id: 12345 };
//! let lobby = Lobby::new(
//!     user,
//!     catalog,
//!     Launcher::for_native_client(config.native_client.clone()),
//!     Arc::new(WebSocketConnector::new(config.connect_timeout)),
//! );
//!
//! let mut rooms = lobby.room_list(RoomFilter::Waiting);
//! while let Some(signal) = rooms.recv().await {
//!     println!("{:?}", signal);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod bridge;
pub mod catalog;
pub mod config;
pub mod error;
pub mod feed;
pub mod lobby;
