use std::collections::HashMap;
use std::rc::Rc;

use inkwire_shared::Point;

use crate::capture::CapturePipeline;
use crate::state::{CURSOR_IDLE_MS, CURSOR_INTERVAL_MS};
use crate::transmit::Transmitter;

/// Rate limits cursor broadcasts. Updates inside the window are dropped,
/// never queued: the next one supersedes them anyway.
pub struct CursorThrottle {
    transmitter: Rc<dyn Transmitter>,
    interval_ms: f64,
    last_sent: Option<f64>,
}

impl CursorThrottle {
    pub fn new(transmitter: Rc<dyn Transmitter>) -> Self {
        Self::with_interval(transmitter, CURSOR_INTERVAL_MS)
    }

    pub fn with_interval(transmitter: Rc<dyn Transmitter>, interval_ms: f64) -> Self {
        Self {
            transmitter,
            interval_ms,
            last_sent: None,
        }
    }

    pub fn moved(&mut self, point: Point, now: f64) -> bool {
        if let Some(last) = self.last_sent {
            if now - last < self.interval_ms {
                return false;
            }
        }
        self.transmitter.send_cursor(point);
        self.last_sent = Some(now);
        true
    }

    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}

/// Tracks when each remote cursor was last heard from.
#[derive(Debug, Default)]
pub struct RemoteCursors {
    last_seen: HashMap<String, f64>,
}

impl RemoteCursors {
    pub fn seen(&mut self, user_id: &str, now: f64) {
        self.last_seen.insert(user_id.to_string(), now);
    }

    pub fn forget(&mut self, user_id: &str) -> bool {
        self.last_seen.remove(user_id).is_some()
    }

    /// Removes and returns the cursors idle for longer than the timeout.
    pub fn expire(&mut self, now: f64) -> Vec<String> {
        let expired = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now - **seen >= CURSOR_IDLE_MS)
            .map(|(id, _)| id.clone())
            .collect::<Vec<_>>();
        for id in &expired {
            self.last_seen.remove(id);
        }
        expired
    }

    pub fn drain(&mut self) -> Vec<String> {
        self.last_seen.drain().map(|(id, _)| id).collect()
    }
}

/// Drops the state that belonged to a lost connection: the drag in progress,
/// the cursor window and every remote cursor. The next join starts clean.
/// Returns the users whose markers should be taken down.
pub fn forget_connection(
    pipeline: &mut CapturePipeline,
    throttle: &mut CursorThrottle,
    cursors: &mut RemoteCursors,
) -> Vec<String> {
    pipeline.cancel();
    throttle.reset();
    cursors.drain()
}
