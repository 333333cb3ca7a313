use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use inkwire_shared::ServerMessage;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use crate::history::OperationLog;
use crate::presence::PresenceRegistry;

pub const MAX_ID_LEN: usize = 64;
pub const MAX_COLOR_LEN: usize = 32;
pub const MAX_POINTS_PER_OPERATION: usize = 5000;
pub const MAX_WIDTH: f32 = 100.0;
pub const DEFAULT_COLOR: &str = "#000000";

pub type PeerSender = mpsc::UnboundedSender<ServerMessage>;

#[derive(Clone, Default)]
pub struct AppState {
    pub canvas: Arc<Mutex<Canvas>>,
}

/// Everything one event may touch. Held under a single lock so the mutation
/// and the fanout it triggers are never interleaved with another event.
#[derive(Default)]
pub struct Canvas {
    pub log: OperationLog,
    pub presence: PresenceRegistry,
    pub peers: HashMap<Uuid, PeerSender>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
