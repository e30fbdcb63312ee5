use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use clap::Parser;

use server::bus::UpdateBus;
use server::canvas::{Canvas, CanvasService};
use server::config::Config;
use server::handlers::{self, AppState};
use server::manager::spawn_session_manager;
use system::{FileStore, MemoryStore};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = Config::parse();
    let bus = UpdateBus::new(config.bus_capacity);
    let service: Arc<dyn CanvasService> = match &config.data_file {
        Some(path) => {
            let store = FileStore::open(path)
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
            log::info!("Persisting canvas to {}", path.display());
            Arc::new(Canvas::new(store, bus).with_bounds(config.bounds()))
        }
        None => Arc::new(Canvas::new(MemoryStore::new(), bus).with_bounds(config.bounds())),
    };

    let manager = spawn_session_manager(service.clone(), config.session());
    let state = web::Data::new(AppState {
        service,
        manager,
        outbound_capacity: config.outbound_capacity.max(1),
    });

    log::info!("Listening on {}", config.bind);
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(handlers::root)
    })
    .bind(&config.bind)?
    .run()
    .await
}
