use std::sync::Arc;

use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use system::serde::Deserialize;
use system::serde_json::json;
use system::{StoreError, Viewport};
use thiserror::Error;

use crate::canvas::CanvasService;
use crate::connection::ws_index;
use crate::handlers::admin::configure_admin_handlers;
use crate::handlers::cells::configure_cell_handlers;
use crate::manager::ManagerTx;

mod admin;
mod cells;

pub struct AppState {
    pub service: Arc<dyn CanvasService>,
    pub manager: ManagerTx,
    pub outbound_capacity: usize,
}

/// Viewport from query parameters; missing bounds are unbounded.
#[derive(Debug, Default, Deserialize)]
pub struct ViewportQuery {
    min_x: Option<i32>,
    min_y: Option<i32>,
    max_x: Option<i32>,
    max_y: Option<i32>,
}

impl From<ViewportQuery> for Viewport {
    fn from(query: ViewportQuery) -> Self {
        let all = Viewport::all();
        Viewport::new(
            query.min_x.unwrap_or(all.min_x),
            query.min_y.unwrap_or(all.min_y),
            query.max_x.unwrap_or(all.max_x),
            query.max_y.unwrap_or(all.max_y),
        )
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("session manager is not running")]
    ManagerGone,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

pub fn root(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/ws").route(web::get().to(ws_index)));

    configure_cell_handlers(cfg);
    configure_admin_handlers(cfg);
}
