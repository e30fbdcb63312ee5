use actix_web::{web, HttpResponse, Responder};
use system::serde_json::json;
use tokio::sync::oneshot;

use crate::handlers::{ApiError, AppState};
use crate::manager::ManagerCommand;

pub fn configure_admin_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/admin").service(web::resource("/stats").route(web::get().to(stats))));
}

async fn stats(state: web::Data<AppState>) -> Result<impl Responder, ApiError> {
    let (tx, rx) = oneshot::channel();
    state
        .manager
        .send(ManagerCommand::GetOnline { tx })
        .await
        .map_err(|_| ApiError::ManagerGone)?;
    let online = rx.await.map_err(|_| ApiError::ManagerGone)?;
    Ok(HttpResponse::Ok().json(json!({
        "online": online,
        "sequence": state.service.sequence(),
    })))
}
