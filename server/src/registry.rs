use std::collections::HashMap;
use std::num::Wrapping;

use system::{OutboundMessage, SessionId, Viewport};
use tokio::sync::mpsc::error::TrySendError;

use crate::session::{ControlTx, OutboundTx, SessionControl};

pub struct SessionEntry {
    pub viewport: Viewport,
    pub control: ControlTx,
    pub outbound: OutboundTx,
}

/// Live sessions by id. Owned by the manager task only.
pub struct SessionRegistry {
    session_id_source: Wrapping<SessionId>,
    sessions: HashMap<SessionId, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            session_id_source: Wrapping(0),
            sessions: HashMap::new(),
        }
    }

    pub fn new_session_id(&mut self) -> SessionId {
        loop {
            self.session_id_source += Wrapping(1);
            let id = self.session_id_source.0;
            if !self.sessions.contains_key(&id) {
                break id;
            }
        }
    }

    pub fn register(&mut self, id: SessionId, entry: SessionEntry) {
        self.sessions.insert(id, entry);
        log::info!("Session {} registered, {} online", id, self.online());
    }

    pub fn deregister(&mut self, id: &SessionId) -> Option<SessionEntry> {
        let entry = self.sessions.remove(id);
        if entry.is_some() {
            log::info!("Session {} deregistered, {} online", id, self.online());
        }
        entry
    }

    pub fn online(&self) -> usize {
        self.sessions.len()
    }

    pub fn set_viewport(&mut self, id: &SessionId, viewport: Viewport) -> bool {
        match self.sessions.get_mut(id) {
            Some(entry) => {
                entry.viewport = viewport;
                entry
                    .control
                    .try_send(SessionControl::SetViewport(viewport))
                    .is_ok()
            }
            None => false,
        }
    }

    /// Best-effort `stats` to every session; full channels skip this round.
    pub fn broadcast_stats(&self) {
        let message = OutboundMessage::Stats {
            online: self.online(),
        };
        for (id, entry) in &self.sessions {
            match entry.outbound.try_send(message.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => log::debug!("Session {} skipped stats", id),
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
