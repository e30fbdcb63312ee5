use actix_web::{web, HttpResponse, Responder};
use system::PaintRequest;

use crate::handlers::{ApiError, AppState, ViewportQuery};

pub fn configure_cell_handlers(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/cells").route(web::post().to(paint_cell)))
        .service(web::resource("/region").route(web::get().to(get_region)));
}

async fn paint_cell(
    state: web::Data<AppState>,
    request: web::Json<PaintRequest>,
) -> Result<impl Responder, ApiError> {
    let receipt = state.service.paint_cell(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(receipt))
}

async fn get_region(
    state: web::Data<AppState>,
    query: web::Query<ViewportQuery>,
) -> Result<impl Responder, ApiError> {
    let snapshot = state.service.get_region(query.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(snapshot))
}
