use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_APPS_URL: &str = "https://sapi.moecube.com:444/apps.json";
pub const DEFAULT_APP_ID: &str = "ygopro";
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

/// Runtime settings of the lobby, assembled by the binary from its
/// command-line arguments.
#[derive(Debug, Clone)]
pub struct LobbyConfig {
    /// Platform app listing the server catalog is read from.
    pub apps_url: String,
    pub app_id: String,
    /// Local copy of the app listing, used instead of `apps_url` when set.
    pub catalog_path: Option<PathBuf>,
    pub connect_timeout: Duration,
    /// Native game client executable. Without one every bridge call fails
    /// and is reported as a diagnostic.
    pub native_client: Option<PathBuf>,
}

impl Default for LobbyConfig {
    fn default() -> Self {
        Self {
            apps_url: DEFAULT_APPS_URL.to_string(),
            app_id: DEFAULT_APP_ID.to_string(),
            catalog_path: None,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            native_client: None,
        }
    }
}
