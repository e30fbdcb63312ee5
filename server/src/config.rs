use std::path::PathBuf;

use clap::Parser;
use system::Viewport;

use crate::bus::DEFAULT_BUS_CAPACITY;
use crate::session::SessionConfig;

/// Collaborative pixel canvas server.
#[derive(Debug, Clone, Parser)]
#[command(name = "pixel-server", version)]
pub struct Config {
    /// Address the HTTP/WebSocket listener binds to.
    #[arg(long, env = "PIXEL_BIND", default_value = "127.0.0.1:8080")]
    pub bind: String,

    /// Persist the canvas to this JSON file. In-memory only when absent.
    #[arg(long, env = "PIXEL_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Per-subscriber backlog on the update bus.
    #[arg(long, env = "PIXEL_BUS_CAPACITY", default_value_t = DEFAULT_BUS_CAPACITY)]
    pub bus_capacity: usize,

    /// Updates a session may buffer while its snapshot is in flight.
    #[arg(long, env = "PIXEL_BUFFER_CAPACITY", default_value_t = system::DEFAULT_BUFFER_CAPACITY)]
    pub buffer_capacity: usize,

    /// Messages queued per WebSocket before the session waits on it.
    #[arg(long, env = "PIXEL_OUTBOUND_CAPACITY", default_value_t = 256)]
    pub outbound_capacity: usize,

    /// Canvas width; unbounded when absent.
    #[arg(long, env = "PIXEL_WIDTH", requires = "height")]
    pub width: Option<u32>,

    #[arg(long, env = "PIXEL_HEIGHT", requires = "width")]
    pub height: Option<u32>,
}

impl Config {
    pub fn bounds(&self) -> Viewport {
        match (self.width, self.height) {
            (Some(width), Some(height)) => Viewport::from_origin(0, 0, width, height),
            _ => Viewport::all(),
        }
    }

    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            buffer_capacity: self.buffer_capacity,
        }
    }
}
