//! Snapshot-to-stream handoff for one viewer.
//!
//! The owner subscribes to the update feed first, feeds everything it
//! receives into [`Handoff::receive`], then requests a snapshot and hands it
//! to [`Handoff::install_snapshot`]. Buffered updates already reflected in
//! the snapshot are dropped by sequence number, the rest are replayed, and
//! from then on updates flow straight through. Any discontinuity sends the
//! machine back to `Connecting` so the owner takes a fresh snapshot.

use crate::error::SyncError;
use crate::message::OutboundMessage;
use crate::types::*;
use std::collections::VecDeque;

pub const DEFAULT_BUFFER_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HandoffState {
    /// Subscribed, no snapshot requested yet. Updates are buffered.
    Connecting,
    /// Snapshot in flight. Updates are buffered.
    Handoff,
    /// Snapshot installed and buffer drained.
    Live,
    Closed,
}

pub struct Handoff {
    viewport: Viewport,
    state: HandoffState,
    last_applied: Sequence,
    buffer: VecDeque<Update>,
    capacity: usize,
}

impl Handoff {
    pub fn new(viewport: Viewport) -> Self {
        Self::with_capacity(viewport, DEFAULT_BUFFER_CAPACITY)
    }

    pub fn with_capacity(viewport: Viewport, capacity: usize) -> Self {
        Self {
            viewport,
            state: HandoffState::Connecting,
            last_applied: 0,
            buffer: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn state(&self) -> HandoffState {
        self.state
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn last_applied(&self) -> Sequence {
        self.last_applied
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Marks the snapshot request as sent.
    pub fn begin_snapshot(&mut self) {
        if self.state == HandoffState::Connecting {
            self.state = HandoffState::Handoff;
        }
    }

    /// Takes one update from the feed.
    ///
    /// Before `Live` it is buffered and nothing is returned. In `Live` it is
    /// applied: duplicates are dropped, the next sequence is forwarded if it
    /// falls inside the viewport, and anything further ahead is a gap.
    pub fn receive(&mut self, update: Update) -> Result<Option<OutboundMessage>, SyncError> {
        match self.state {
            HandoffState::Connecting | HandoffState::Handoff => {
                if self.buffer.len() >= self.capacity {
                    let skipped = self.buffer.len() as u64 + 1;
                    return Err(self.overrun(skipped));
                }
                self.buffer.push_back(update);
                Ok(None)
            }
            HandoffState::Live => self.apply(update).map_err(|e| {
                self.reset();
                e
            }),
            HandoffState::Closed => Ok(None),
        }
    }

    /// Emits `Init` for `snapshot`, then replays the buffer.
    ///
    /// On a gap the state returns to `Connecting` and nothing past the gap is
    /// applied; messages produced before the gap are discarded with it, since
    /// the resync sends a fresh `Init` anyway.
    pub fn install_snapshot(
        &mut self,
        snapshot: Snapshot,
    ) -> Result<Vec<OutboundMessage>, SyncError> {
        if self.state == HandoffState::Closed {
            return Ok(Vec::new());
        }
        self.state = HandoffState::Handoff;
        self.last_applied = snapshot.sequence;

        let mut messages = vec![OutboundMessage::init(snapshot)];
        while let Some(update) = self.buffer.pop_front() {
            match self.apply(update) {
                Ok(Some(message)) => messages.push(message),
                Ok(None) => {}
                Err(e) => {
                    self.reset();
                    return Err(e);
                }
            }
        }
        self.state = HandoffState::Live;
        Ok(messages)
    }

    /// The feed dropped `skipped` updates. Forces a resync.
    pub fn overrun(&mut self, skipped: u64) -> SyncError {
        self.reset();
        SyncError::BusOverrun { skipped }
    }

    /// Switches region. The next snapshot must cover the new viewport, so
    /// this forces a resync like an overrun does.
    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        if self.state != HandoffState::Closed {
            self.reset();
        }
    }

    pub fn close(&mut self) {
        self.state = HandoffState::Closed;
        self.buffer = VecDeque::new();
    }

    fn reset(&mut self) {
        self.state = HandoffState::Connecting;
        self.buffer.clear();
    }

    fn apply(&mut self, update: Update) -> Result<Option<OutboundMessage>, SyncError> {
        let expected = self.last_applied + 1;
        if update.sequence < expected {
            return Ok(None);
        }
        if update.sequence > expected {
            return Err(SyncError::SequenceGap {
                expected,
                found: update.sequence,
            });
        }
        self.last_applied = update.sequence;
        if self.viewport.contains(&update.coordinate) {
            Ok(Some(OutboundMessage::delta(&update)))
        } else {
            Ok(None)
        }
    }
}
