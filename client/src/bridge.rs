//! Bridge to the native game client
//!
//! Every call goes through [`Launcher`], which never lets a bridge failure
//! escape: the error is logged and a [`Diagnostic`] naming the method and its
//! arguments is handed to a [`DiagnosticSink`] so the operator can run the
//! call by hand.

use crate::error::BridgeError;
use log::{debug, error, info, warn};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Capabilities the native client exposes to the lobby.
pub trait NativeBridge: Send + Sync {
    fn join(&self, address: &str, port: u16, username: &str, token: &str)
        -> Result<(), BridgeError>;
    fn edit_deck(&self, deck: Option<&str>) -> Result<(), BridgeError>;
    fn watch_replay(&self) -> Result<(), BridgeError>;
    fn puzzle_mode(&self) -> Result<(), BridgeError>;
    fn open_drawer(&self) -> Result<(), BridgeError>;
    fn back_home(&self) -> Result<(), BridgeError>;
    fn share(&self, text: &str) -> Result<(), BridgeError>;
}

/// A bridge call that failed, in a form the operator can replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostic {
    pub method: String,
    pub params: Vec<Value>,
}

impl Diagnostic {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"method\":\"{}\"}}", self.method))
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn report(&self, diagnostic: Diagnostic);
}

/// Prints diagnostics to stderr for the person at the terminal.
pub struct AlertSink;

impl DiagnosticSink for AlertSink {
    fn report(&self, diagnostic: Diagnostic) {
        eprintln!("{}", diagnostic.to_json());
    }
}

/// Launches the native client executable as `<program> <method> [args..]`.
pub struct ProcessBridge {
    program: PathBuf,
}

impl ProcessBridge {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    fn launch(&self, method: &str, args: &[&str]) -> Result<(), BridgeError> {
        let child = Command::new(&self.program)
            .arg(method)
            .args(args)
            .spawn()
            .map_err(BridgeError::Spawn)?;
        info!(
            "Started {} {} (pid {})",
            self.program.display(),
            method,
            child.id()
        );
        reap(child);
        Ok(())
    }
}

/// Waits for `child` on its own thread so an exited native client does not
/// linger as a zombie.
fn reap(mut child: Child) -> JoinHandle<Option<ExitStatus>> {
    thread::spawn(move || {
        let pid = child.id();
        match child.wait() {
            Ok(status) => {
                debug!("Native client (pid {}) exited: {}", pid, status);
                Some(status)
            }
            Err(e) => {
                warn!("Waiting for native client (pid {}) failed: {}", pid, e);
                None
            }
        }
    })
}

impl NativeBridge for ProcessBridge {
    fn join(
        &self,
        address: &str,
        port: u16,
        username: &str,
        token: &str,
    ) -> Result<(), BridgeError> {
        let port = port.to_string();
        self.launch("join", &[address, &port, username, token])
    }

    fn edit_deck(&self, deck: Option<&str>) -> Result<(), BridgeError> {
        match deck {
            Some(deck) => self.launch("edit_deck", &[deck]),
            None => self.launch("edit_deck", &[]),
        }
    }

    fn watch_replay(&self) -> Result<(), BridgeError> {
        self.launch("watch_replay", &[])
    }

    fn puzzle_mode(&self) -> Result<(), BridgeError> {
        self.launch("puzzle_mode", &[])
    }

    fn open_drawer(&self) -> Result<(), BridgeError> {
        self.launch("openDrawer", &[])
    }

    fn back_home(&self) -> Result<(), BridgeError> {
        self.launch("backHome", &[])
    }

    fn share(&self, text: &str) -> Result<(), BridgeError> {
        self.launch("share", &[text])
    }
}

/// Stand-in when no native client is configured. Every call fails.
pub struct UnavailableBridge;

impl NativeBridge for UnavailableBridge {
    fn join(&self, _: &str, _: u16, _: &str, _: &str) -> Result<(), BridgeError> {
        Err(BridgeError::Unavailable)
    }

    fn edit_deck(&self, _: Option<&str>) -> Result<(), BridgeError> {
        Err(BridgeError::Unavailable)
    }

    fn watch_replay(&self) -> Result<(), BridgeError> {
        Err(BridgeError::Unavailable)
    }

    fn puzzle_mode(&self) -> Result<(), BridgeError> {
        Err(BridgeError::Unavailable)
    }

    fn open_drawer(&self) -> Result<(), BridgeError> {
        Err(BridgeError::Unavailable)
    }

    fn back_home(&self) -> Result<(), BridgeError> {
        Err(BridgeError::Unavailable)
    }

    fn share(&self, _: &str) -> Result<(), BridgeError> {
        Err(BridgeError::Unavailable)
    }
}

/// Invokes the bridge and turns failures into diagnostics. Methods return
/// whether the native client accepted the call.
#[derive(Clone)]
pub struct Launcher {
    bridge: Arc<dyn NativeBridge>,
    sink: Arc<dyn DiagnosticSink>,
}

impl Launcher {
    pub fn new(bridge: Arc<dyn NativeBridge>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { bridge, sink }
    }

    /// Bridge for `native_client`, or one that always reports when none is set.
    pub fn for_native_client(native_client: Option<PathBuf>) -> Self {
        let bridge: Arc<dyn NativeBridge> = match native_client {
            Some(program) => Arc::new(ProcessBridge::new(program)),
            None => Arc::new(UnavailableBridge),
        };
        Self::new(bridge, Arc::new(AlertSink))
    }

    fn invoke<F>(&self, method: &str, params: Vec<Value>, call: F) -> bool
    where
        F: FnOnce(&dyn NativeBridge) -> Result<(), BridgeError>,
    {
        match call(self.bridge.as_ref()) {
            Ok(()) => true,
            Err(e) => {
                error!("Native call {} failed: {}", method, e);
                self.sink.report(Diagnostic {
                    method: method.to_string(),
                    params,
                });
                false
            }
        }
    }

    pub fn join(&self, address: &str, port: u16, username: &str, token: &str) -> bool {
        info!("Joining {}:{} as {}", address, port, username);
        self.invoke(
            "join",
            vec![json!(address), json!(port), json!(username), json!(token)],
            |bridge| bridge.join(address, port, username, token),
        )
    }

    /// Opens the deck editor, falling back to the editor without a deck when
    /// the given deck cannot be opened.
    pub fn edit_deck(&self, deck: Option<&str>) -> bool {
        if let Some(deck) = deck {
            match self.bridge.edit_deck(Some(deck)) {
                Ok(()) => return true,
                Err(e) => warn!("Opening deck {} failed, retrying without it: {}", deck, e),
            }
        }
        self.invoke("edit_deck", Vec::new(), |bridge| bridge.edit_deck(None))
    }

    pub fn watch_replay(&self) -> bool {
        self.invoke("watch_replay", Vec::new(), |bridge| bridge.watch_replay())
    }

    pub fn puzzle_mode(&self) -> bool {
        self.invoke("puzzle_mode", Vec::new(), |bridge| bridge.puzzle_mode())
    }

    pub fn open_drawer(&self) -> bool {
        self.invoke("openDrawer", Vec::new(), |bridge| bridge.open_drawer())
    }

    pub fn back_home(&self) -> bool {
        self.invoke("backHome", Vec::new(), |bridge| bridge.back_home())
    }

    pub fn share(&self, text: &str) -> bool {
        self.invoke("share", vec![json!(text)], |bridge| bridge.share(text))
    }
}
