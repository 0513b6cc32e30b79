//! Server catalog published by the platform's app listing

use crate::config::LobbyConfig;
use crate::error::LobbyError;
use log::{debug, info};
use serde::Deserialize;
use shared::Server;
use std::path::Path;
use std::sync::Arc;

/// Entry of the platform's `apps.json`. Only the matching app's `data` is
/// interpreted.
#[derive(Debug, Deserialize)]
struct App {
    id: String,
    #[serde(default)]
    data: serde_json::Value,
}

/// Immutable list of known servers. A re-fetch replaces the whole catalog.
#[derive(Debug, Clone, Default)]
pub struct ServerCatalog {
    servers: Vec<Arc<Server>>,
}

impl ServerCatalog {
    pub fn new(servers: Vec<Server>) -> Self {
        Self {
            servers: servers.into_iter().map(Arc::new).collect(),
        }
    }

    /// Loads the catalog from `catalog_path` when configured, otherwise
    /// from `apps_url`.
    pub async fn obtain(config: &LobbyConfig) -> Result<Self, LobbyError> {
        match &config.catalog_path {
            Some(path) => Self::load(path, &config.app_id),
            None => Self::fetch(&config.apps_url, &config.app_id).await,
        }
    }

    pub async fn fetch(apps_url: &str, app_id: &str) -> Result<Self, LobbyError> {
        info!("Fetching server catalog from {}", apps_url);
        let apps: Vec<App> = reqwest::get(apps_url)
            .await?
            .error_for_status()?
            .json()
            .await?;
        Self::from_apps(apps, app_id)
    }

    /// Reads an app listing, or a bare server array, from disk.
    pub fn load(path: &Path, app_id: &str) -> Result<Self, LobbyError> {
        info!("Loading server catalog from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        match serde_json::from_str::<Vec<App>>(&text) {
            Ok(apps) => Self::from_apps(apps, app_id),
            Err(_) => Ok(Self::new(serde_json::from_str(&text)?)),
        }
    }

    pub fn from_apps_json(json: &str, app_id: &str) -> Result<Self, LobbyError> {
        Self::from_apps(serde_json::from_str(json)?, app_id)
    }

    fn from_apps(apps: Vec<App>, app_id: &str) -> Result<Self, LobbyError> {
        let app = apps
            .into_iter()
            .find(|app| app.id == app_id)
            .ok_or_else(|| LobbyError::AppNotFound(app_id.to_string()))?;
        let servers = match app.data.get("servers") {
            Some(servers) => Vec::<Server>::deserialize(servers)?,
            None => Vec::new(),
        };
        debug!("App {} lists {} servers", app_id, servers.len());
        Ok(Self::new(servers))
    }

    pub fn servers(&self) -> &[Arc<Server>] {
        &self.servers
    }

    pub fn find(&self, id: &str) -> Option<Arc<Server>> {
        self.servers
            .iter()
            .find(|server| server.id.as_deref() == Some(id))
            .cloned()
    }

    /// Non-hidden servers satisfying `condition`, in catalog order.
    pub fn selectable<F>(&self, condition: F) -> Vec<Arc<Server>>
    where
        F: Fn(&Server) -> bool,
    {
        self.servers
            .iter()
            .filter(|server| !server.hidden && condition(server))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPS: &str = r#"[
        {"id": "other", "data": null},
        {"id": "ygopro", "news": {}, "data": {"servers": [
            {"id": "tiramisu", "name": "Arena", "url": "wss://tiramisu.example/", "address": "10.0.0.1", "port": 7911, "custom": true},
            {"id": "hidden", "address": "10.0.0.2", "port": 7911, "hidden": true},
            {"id": "replay", "url": "wss://replay.example/", "address": "10.0.0.3", "port": 7922, "replay": true, "windbot": ["Joey", "Kaiba"]}
        ]}}
    ]"#;

    #[test]
    fn test_parse_apps_listing() {
        let catalog = ServerCatalog::from_apps_json(APPS, "ygopro").unwrap();
        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.servers()[0].name.as_deref(), Some("Arena"));
        assert_eq!(catalog.servers()[2].windbots(), ["Joey", "Kaiba"]);
        assert!(catalog.servers()[1].hidden);
    }

    #[test]
    fn test_missing_app() {
        match ServerCatalog::from_apps_json(APPS, "missing") {
            Err(LobbyError::AppNotFound(id)) => assert_eq!(id, "missing"),
            other => panic!("Expected AppNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_app_without_servers_is_empty() {
        let catalog = ServerCatalog::from_apps_json(APPS, "other").unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_selectable_skips_hidden() {
        let catalog = ServerCatalog::from_apps_json(APPS, "ygopro").unwrap();

        let all: Vec<_> = catalog
            .selectable(|_| true)
            .iter()
            .filter_map(|s| s.id.clone())
            .collect();
        assert_eq!(all, ["tiramisu", "replay"]);

        let replay_only = catalog.selectable(|s| s.replay);
        assert_eq!(replay_only.len(), 1);
        assert_eq!(replay_only[0].id.as_deref(), Some("replay"));
    }

    #[test]
    fn test_find_server() {
        let catalog = ServerCatalog::from_apps_json(APPS, "ygopro").unwrap();
        assert_eq!(catalog.find("replay").unwrap().port, 7922);
        assert!(catalog.find("nope").is_none());
    }
}
