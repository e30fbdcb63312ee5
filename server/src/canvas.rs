use async_trait::async_trait;
use parking_lot::Mutex;
use system::{
    CanvasStore, Color, Coordinate, PaintReceipt, PaintRequest, Sequence, Snapshot, StoreError,
    Viewport,
};
use tokio::sync::Mutex as AsyncMutex;

use crate::bus::{Feed, UpdateBus};

/// What gateways and sessions need from the state owner.
#[async_trait]
pub trait CanvasService: Send + Sync {
    async fn paint_cell(&self, request: PaintRequest) -> Result<PaintReceipt, StoreError>;

    async fn get_region(&self, viewport: Viewport) -> Result<Snapshot, StoreError>;

    fn subscribe(&self) -> Feed;

    fn sequence(&self) -> Sequence;
}

/// State owner. Writers queue on `writer`, so sequence assignment, persistence
/// and publish happen as one step. The store lock is only held for memory
/// access, never across disk I/O.
pub struct Canvas<S> {
    store: Mutex<S>,
    writer: AsyncMutex<()>,
    bus: UpdateBus,
    bounds: Viewport,
}

impl<S: CanvasStore> Canvas<S> {
    pub fn new(store: S, bus: UpdateBus) -> Self {
        Self {
            store: Mutex::new(store),
            writer: AsyncMutex::new(()),
            bus,
            bounds: Viewport::all(),
        }
    }

    /// Paints outside `bounds` are refused.
    pub fn with_bounds(mut self, bounds: Viewport) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn bus(&self) -> &UpdateBus {
        &self.bus
    }

    pub async fn paint(&self, request: PaintRequest) -> Result<PaintReceipt, StoreError> {
        let coordinate = Coordinate::new(request.x, request.y);
        let _writer = self.writer.lock().await;

        let (update, job) = {
            let store = self.store.lock();
            let color = match Color::new(request.color) {
                Some(color) if self.bounds.contains(&coordinate) => color,
                _ => {
                    log::debug!("Rejected paint at {}", coordinate);
                    return Ok(PaintReceipt {
                        accepted: false,
                        sequence: store.sequence(),
                    });
                }
            };
            let update = store.next_update(coordinate, color);
            let job = store.persist_job(&update);
            (update, job)
        };

        if let Some(job) = job {
            let persisted = tokio::task::spawn_blocking(job)
                .await
                .unwrap_or_else(|e| Err(StoreError::Unavailable(e.to_string())));
            if let Err(e) = persisted {
                log::warn!("Write at {} failed: {}", coordinate, e);
                return Err(e);
            }
        }

        let sequence = update.sequence;
        let mut store = self.store.lock();
        store.apply(&update);
        self.bus.publish(update);
        Ok(PaintReceipt {
            accepted: true,
            sequence,
        })
    }

    pub fn snapshot(&self, viewport: &Viewport) -> Result<Snapshot, StoreError> {
        self.store.lock().snapshot(viewport)
    }
}

#[async_trait]
impl<S: CanvasStore + Send> CanvasService for Canvas<S> {
    async fn paint_cell(&self, request: PaintRequest) -> Result<PaintReceipt, StoreError> {
        self.paint(request).await
    }

    async fn get_region(&self, viewport: Viewport) -> Result<Snapshot, StoreError> {
        self.snapshot(&viewport)
    }

    fn subscribe(&self) -> Feed {
        // taken under the store lock so it orders against publishes
        let _store = self.store.lock();
        self.bus.subscribe()
    }

    fn sequence(&self) -> Sequence {
        self.store.lock().sequence()
    }
}
