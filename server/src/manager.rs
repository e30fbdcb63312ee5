use std::sync::Arc;

use system::{SessionId, Viewport};
use tokio::sync::mpsc::{self, channel, Sender};
use tokio::sync::oneshot;

use crate::canvas::CanvasService;
use crate::registry::{SessionEntry, SessionRegistry};
use crate::session::{CloseReason, OutboundTx, Session, SessionConfig};

#[derive(Debug)]
pub enum ManagerCommand {
    Register {
        viewport: Viewport,
        outbound: OutboundTx,
        tx: oneshot::Sender<SessionId>,
    },
    Deregister {
        id: SessionId,
    },
    SetViewport {
        id: SessionId,
        viewport: Viewport,
    },
    GetOnline {
        tx: oneshot::Sender<usize>,
    },
}

pub type ManagerTx = Sender<ManagerCommand>;

struct SessionManager {
    service: Arc<dyn CanvasService>,
    config: SessionConfig,
    registry: SessionRegistry,
    exited_tx: mpsc::UnboundedSender<(SessionId, CloseReason)>,
}

impl SessionManager {
    fn handle_command(&mut self, command: ManagerCommand) {
        match command {
            ManagerCommand::Register {
                viewport,
                outbound,
                tx,
            } => {
                let id = self.registry.new_session_id();
                let (session, control) = Session::new(
                    id,
                    self.service.clone(),
                    viewport,
                    self.config,
                    outbound.clone(),
                );
                self.registry.register(
                    id,
                    SessionEntry {
                        viewport,
                        control,
                        outbound,
                    },
                );

                let exited_tx = self.exited_tx.clone();
                tokio::spawn(async move {
                    let reason = session.run().await;
                    let _ = exited_tx.send((id, reason));
                });

                if tx.send(id).is_err() {
                    log::debug!("Session {} registered after caller left", id);
                    self.remove(&id);
                } else {
                    self.registry.broadcast_stats();
                }
            }
            ManagerCommand::Deregister { id } => self.remove(&id),
            ManagerCommand::SetViewport { id, viewport } => {
                if !self.registry.set_viewport(&id, viewport) {
                    log::warn!("Viewport change for unknown session {}", id);
                }
            }
            ManagerCommand::GetOnline { tx } => {
                let _ = tx.send(self.registry.online());
            }
        }
    }

    /// Dropping the entry drops the session's control sender, which closes it.
    fn remove(&mut self, id: &SessionId) {
        if self.registry.deregister(id).is_some() {
            self.registry.broadcast_stats();
        }
    }
}

pub fn spawn_session_manager(service: Arc<dyn CanvasService>, config: SessionConfig) -> ManagerTx {
    let (manager_tx, mut manager_rx) = channel::<ManagerCommand>(64);
    let (exited_tx, mut exited_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        let mut manager = SessionManager {
            service,
            config,
            registry: SessionRegistry::new(),
            exited_tx,
        };
        log::info!("Session manager started");

        loop {
            tokio::select! {
                command = manager_rx.recv() => match command {
                    Some(command) => manager.handle_command(command),
                    None => break,
                },
                Some((id, reason)) = exited_rx.recv() => {
                    log::debug!("Session {} exited: {:?}", id, reason);
                    manager.remove(&id);
                }
            }
        }

        manager.registry.clear();
        log::info!("Session manager terminated");
    });

    manager_tx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::UpdateBus;
    use crate::canvas::Canvas;
    use system::{MemoryStore, OutboundMessage};

    async fn register(manager: &ManagerTx, outbound: OutboundTx) -> SessionId {
        let (tx, rx) = oneshot::channel();
        manager
            .send(ManagerCommand::Register {
                viewport: Viewport::all(),
                outbound,
                tx,
            })
            .await
            .expect("");
        rx.await.expect("")
    }

    async fn online(manager: &ManagerTx) -> usize {
        let (tx, rx) = oneshot::channel();
        manager
            .send(ManagerCommand::GetOnline { tx })
            .await
            .expect("");
        rx.await.expect("")
    }

    async fn next_stats(rx: &mut mpsc::Receiver<OutboundMessage>) -> usize {
        loop {
            match rx.recv().await.expect("open") {
                OutboundMessage::Stats { online } => break online,
                _ => continue,
            }
        }
    }

    #[tokio::test]
    async fn online_count_follows_register_and_deregister() {
        let canvas = Arc::new(Canvas::new(MemoryStore::new(), UpdateBus::default()));
        let manager = spawn_session_manager(canvas, SessionConfig::default());

        let (first_tx, mut first_rx) = mpsc::channel(16);
        let first = register(&manager, first_tx).await;
        assert_eq!(next_stats(&mut first_rx).await, 1);

        let (second_tx, mut second_rx) = mpsc::channel(16);
        let second = register(&manager, second_tx).await;
        assert_ne!(first, second);
        assert_eq!(next_stats(&mut first_rx).await, 2);
        assert_eq!(next_stats(&mut second_rx).await, 2);
        assert_eq!(online(&manager).await, 2);

        manager
            .send(ManagerCommand::Deregister { id: second })
            .await
            .expect("");
        assert_eq!(next_stats(&mut first_rx).await, 1);
        assert_eq!(online(&manager).await, 1);
    }

    #[tokio::test]
    async fn closed_transport_removes_session() {
        let canvas = Arc::new(Canvas::new(MemoryStore::new(), UpdateBus::default()));
        let manager = spawn_session_manager(canvas.clone(), SessionConfig::default());

        let (tx, rx) = mpsc::channel(16);
        register(&manager, tx).await;
        drop(rx);

        // the session notices on its first send (init) and exits
        for _ in 0..100 {
            if online(&manager).await == 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(online(&manager).await, 0);
        assert_eq!(canvas.bus().subscriber_count(), 0);
    }
}
