use std::sync::Arc;

use system::{
    Handoff, HandoffState, OutboundMessage, SessionId, StoreError, SyncError, Viewport,
    DEFAULT_BUFFER_CAPACITY,
};
use tokio::sync::mpsc;

use crate::bus::{Feed, FeedItem};
use crate::canvas::CanvasService;

pub type OutboundTx = mpsc::Sender<OutboundMessage>;
pub type ControlTx = mpsc::Sender<SessionControl>;

#[derive(Debug)]
pub enum SessionControl {
    SetViewport(Viewport),
    Close,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum CloseReason {
    Disconnected,
    TransportClosed,
    StoreUnavailable(StoreError),
    BusClosed,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub buffer_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

enum Flow {
    Resync,
    Close(CloseReason),
}

/// One viewer: subscribes, snapshots, replays, then streams deltas to its
/// outbound channel until the control channel or the transport goes away.
pub struct Session {
    id: SessionId,
    service: Arc<dyn CanvasService>,
    handoff: Handoff,
    outbound: OutboundTx,
    control: mpsc::Receiver<SessionControl>,
}

impl Session {
    pub fn new(
        id: SessionId,
        service: Arc<dyn CanvasService>,
        viewport: Viewport,
        config: SessionConfig,
        outbound: OutboundTx,
    ) -> (Self, ControlTx) {
        let (control_tx, control) = mpsc::channel(8);
        let session = Self {
            id,
            service,
            handoff: Handoff::with_capacity(viewport, config.buffer_capacity),
            outbound,
            control,
        };
        (session, control_tx)
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub async fn run(mut self) -> CloseReason {
        // subscribe before the first snapshot so nothing falls in between
        let mut feed = self.service.subscribe();
        log::info!("Session {} subscribed", self.id);

        let reason = loop {
            let flow = match self.handoff_phase(&mut feed).await {
                Ok(()) => self.live_phase(&mut feed).await,
                Err(flow) => flow,
            };
            match flow {
                Flow::Resync => continue,
                Flow::Close(reason) => break reason,
            }
        };

        self.handoff.close();
        drop(feed);
        log::info!("Session {} closed: {:?}", self.id, reason);
        reason
    }

    async fn handoff_phase(&mut self, feed: &mut Feed) -> Result<(), Flow> {
        self.handoff.begin_snapshot();
        let service = self.service.clone();
        let mut snapshot = service.get_region(*self.handoff.viewport());

        let result = loop {
            tokio::select! {
                biased;
                control = self.control.recv() => {
                    return Err(control_flow(self.id, &mut self.handoff, control));
                }
                _ = self.outbound.closed() => return Err(transport_closed(self.id)),
                result = &mut snapshot => break result,
                item = feed.next() => buffer_item(self.id, &mut self.handoff, item)?,
            }
        };

        let snapshot = result.map_err(|e| {
            log::warn!("Session {} snapshot failed: {}", self.id, e);
            Flow::Close(CloseReason::StoreUnavailable(e))
        })?;
        log::debug!(
            "Session {} snapshot at #{} with {} buffered",
            self.id,
            snapshot.sequence,
            self.handoff.buffered()
        );

        match self.handoff.install_snapshot(snapshot) {
            Ok(messages) => {
                for message in messages {
                    self.send(message).await?;
                }
                Ok(())
            }
            Err(e) => Err(resync(self.id, e)),
        }
    }

    async fn live_phase(&mut self, feed: &mut Feed) -> Flow {
        debug_assert_eq!(self.handoff.state(), HandoffState::Live);
        loop {
            let item = tokio::select! {
                biased;
                control = self.control.recv() => {
                    return control_flow(self.id, &mut self.handoff, control);
                }
                _ = self.outbound.closed() => return transport_closed(self.id),
                item = feed.next() => item,
            };

            let message = match item {
                FeedItem::Update(update) => match self.handoff.receive(update) {
                    Ok(message) => message,
                    Err(e) => return resync(self.id, e),
                },
                FeedItem::Overrun(skipped) => {
                    return resync(self.id, self.handoff.overrun(skipped));
                }
                FeedItem::Closed => return Flow::Close(CloseReason::BusClosed),
            };
            if let Some(message) = message {
                if let Err(flow) = self.send(message).await {
                    return flow;
                }
            }
        }
    }

    async fn send(&mut self, message: OutboundMessage) -> Result<(), Flow> {
        tokio::select! {
            biased;
            control = self.control.recv() => {
                Err(control_flow(self.id, &mut self.handoff, control))
            }
            sent = self.outbound.send(message) => sent.map_err(|_| transport_closed(self.id)),
        }
    }
}

fn control_flow(id: SessionId, handoff: &mut Handoff, control: Option<SessionControl>) -> Flow {
    match control {
        Some(SessionControl::SetViewport(viewport)) => {
            log::debug!("Session {} moved to {:?}", id, viewport);
            handoff.set_viewport(viewport);
            Flow::Resync
        }
        Some(SessionControl::Close) | None => Flow::Close(CloseReason::Disconnected),
    }
}

fn buffer_item(id: SessionId, handoff: &mut Handoff, item: FeedItem) -> Result<(), Flow> {
    match item {
        FeedItem::Update(update) => handoff
            .receive(update)
            .map(|_| ())
            .map_err(|e| resync(id, e)),
        FeedItem::Overrun(skipped) => Err(resync(id, handoff.overrun(skipped))),
        FeedItem::Closed => Err(Flow::Close(CloseReason::BusClosed)),
    }
}

fn transport_closed(id: SessionId) -> Flow {
    log::debug!("Session {}: {}", id, SyncError::TransportClosed);
    Flow::Close(CloseReason::TransportClosed)
}

fn resync(id: SessionId, error: SyncError) -> Flow {
    log::warn!("Session {} resyncing: {}", id, error);
    Flow::Resync
}
