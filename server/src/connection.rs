use std::sync::Arc;

use actix::{
    Actor, ActorContext, ActorFutureExt, AsyncContext, Handler, Message, Recipient, Running,
    StreamHandler, WrapFuture,
};
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws::{self, CloseCode, CloseReason};
use system::{serde_json, InboundMessage, OutboundMessage, PaintRequest, SessionId, Viewport};
use tokio::sync::{mpsc, oneshot};

use crate::canvas::CanvasService;
use crate::handlers::{AppState, ViewportQuery};
use crate::manager::{ManagerCommand, ManagerTx};

#[derive(Message)]
#[rtype(result = "()")]
struct Egress(OutboundMessage);

/// The session behind this connection is gone.
#[derive(Message)]
#[rtype(result = "()")]
struct SessionEnded;

enum ConnectionState {
    Idle,
    Connected(SessionId),
}

struct ConnectionActor {
    state: ConnectionState,
    viewport: Viewport,
    outbound_capacity: usize,
    manager: ManagerTx,
    service: Arc<dyn CanvasService>,
}

impl ConnectionActor {
    fn paint(&mut self, request: PaintRequest, ctx: &mut ws::WebsocketContext<Self>) {
        let service = self.service.clone();
        // wait keeps one client's paints in the order it sent them
        ctx.wait(
            async move { service.paint_cell(request).await }
                .into_actor(self)
                .map(|result, _, ctx| match result {
                    Ok(receipt) => log::debug!("Paint receipt {:?}", receipt),
                    Err(e) => {
                        log::warn!("Paint failed: {}", e);
                        ctx.close(Some(CloseReason {
                            code: CloseCode::Again,
                            description: Some(e.to_string()),
                        }));
                        ctx.stop();
                    }
                }),
        );
    }

    fn set_viewport(&mut self, viewport: Viewport, ctx: &mut ws::WebsocketContext<Self>) {
        self.viewport = viewport;
        if let ConnectionState::Connected(id) = self.state {
            ctx.wait(move_session(self.manager.clone(), id, viewport).into_actor(self));
        }
    }
}

/// Waits for room in the manager's queue rather than dropping the change.
async fn move_session(manager: ManagerTx, id: SessionId, viewport: Viewport) {
    if manager
        .send(ManagerCommand::SetViewport { id, viewport })
        .await
        .is_err()
    {
        log::warn!("Session manager gone, viewport change for {} lost", id);
    }
}

/// Forwards one message at a time and waits for the actor to take it, so a
/// slow client fills the bounded outbound channel and the session falls
/// behind on the bus instead of growing the mailbox.
async fn pump_egress(
    mut outbound_rx: mpsc::Receiver<OutboundMessage>,
    egress: Recipient<Egress>,
    ended: Recipient<SessionEnded>,
) {
    log::debug!("connection egress - started");
    while let Some(message) = outbound_rx.recv().await {
        if egress.send(Egress(message)).await.is_err() {
            log::debug!("connection egress - terminated");
            return;
        }
    }
    // every sender is gone: the session exited on its own
    ended.do_send(SessionEnded);
    log::debug!("connection egress - session ended");
}

impl Actor for ConnectionActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        let (outbound, outbound_rx) = mpsc::channel::<OutboundMessage>(self.outbound_capacity);
        let (tx, rx) = oneshot::channel();

        if self
            .manager
            .try_send(ManagerCommand::Register {
                viewport: self.viewport,
                outbound,
                tx,
            })
            .is_err()
        {
            log::warn!("Session manager unavailable, refusing connection");
            ctx.close(Some(CloseCode::Again.into()));
            ctx.stop();
            return;
        }

        let addr = ctx.address();
        tokio::spawn(pump_egress(
            outbound_rx,
            addr.clone().recipient(),
            addr.recipient(),
        ));

        ctx.wait(rx.into_actor(self).map(|result, act, ctx| match result {
            Ok(id) => {
                log::info!("Connection bound to session {}", id);
                act.state = ConnectionState::Connected(id);
            }
            Err(_) => ctx.stop(),
        }));
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let ConnectionState::Connected(id) = self.state {
            let manager = self.manager.clone();
            tokio::spawn(async move {
                if manager.send(ManagerCommand::Deregister { id }).await.is_err() {
                    log::warn!("Could not deregister session {}", id);
                }
            });
            self.state = ConnectionState::Idle;
        }
        Running::Stop
    }
}

/// Ingress
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ConnectionActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Text(text)) => {
                log::debug!("Ingress {}", text);
                match serde_json::from_str::<InboundMessage>(&text) {
                    Ok(InboundMessage::Paint(request)) => self.paint(request, ctx),
                    Ok(InboundMessage::Viewport { viewport }) => {
                        self.set_viewport(viewport, ctx)
                    }
                    Err(e) => {
                        log::debug!("Invalid ingress: {}", e);
                        ctx.close(Some(CloseReason {
                            code: CloseCode::Invalid,
                            description: None,
                        }));
                        ctx.stop();
                    }
                }
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Binary(_)) => {
                ctx.close(Some(CloseCode::Unsupported.into()));
                ctx.stop();
            }
            Err(e) => {
                log::debug!("Protocol error: {}", e);
                ctx.stop();
            }
            _ => (),
        }
    }
}

/// Egress
impl Handler<Egress> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, msg: Egress, ctx: &mut ws::WebsocketContext<Self>) -> Self::Result {
        match serde_json::to_string(&msg.0) {
            Ok(text) => ctx.text(text),
            Err(e) => log::warn!("Could not encode {:?}: {}", msg.0, e),
        }
    }
}

impl Handler<SessionEnded> for ConnectionActor {
    type Result = ();

    fn handle(&mut self, _: SessionEnded, ctx: &mut ws::WebsocketContext<Self>) -> Self::Result {
        if let ConnectionState::Connected(id) = self.state {
            log::info!("Session {} ended, closing connection", id);
        }
        self.state = ConnectionState::Idle;
        ctx.close(Some(CloseReason {
            code: CloseCode::Again,
            description: Some("session ended".into()),
        }));
        ctx.stop();
    }
}

pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<ViewportQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, Error> {
    ws::start(
        ConnectionActor {
            state: ConnectionState::Idle,
            viewport: query.into_inner().into(),
            outbound_capacity: state.outbound_capacity,
            manager: state.manager.clone(),
            service: state.service.clone(),
        },
        &req,
        stream,
    )
}
