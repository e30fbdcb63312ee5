use system::Update;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

pub const DEFAULT_BUS_CAPACITY: usize = 1024;

/// Transient broadcast of accepted writes. Each subscriber gets its own
/// bounded backlog; falling behind drops the oldest entries and surfaces as
/// [`FeedItem::Overrun`] instead of slowing down publishers.
#[derive(Clone)]
pub struct UpdateBus {
    tx: broadcast::Sender<Update>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum FeedItem {
    Update(Update),
    Overrun(u64),
    Closed,
}

pub struct Feed {
    rx: broadcast::Receiver<Update>,
}

impl UpdateBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns how many subscribers the update was queued for.
    pub fn publish(&self, update: Update) -> usize {
        log::debug!("Publish #{} at {}", update.sequence, update.coordinate);
        // no subscribers is not an error
        self.tx.send(update).unwrap_or(0)
    }

    /// Feed of updates published from now on.
    pub fn subscribe(&self) -> Feed {
        Feed {
            rx: self.tx.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for UpdateBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

impl Feed {
    pub async fn next(&mut self) -> FeedItem {
        match self.rx.recv().await {
            Ok(update) => FeedItem::Update(update),
            Err(RecvError::Lagged(skipped)) => FeedItem::Overrun(skipped),
            Err(RecvError::Closed) => FeedItem::Closed,
        }
    }

    /// Non-blocking variant; `None` when nothing is queued.
    pub fn try_next(&mut self) -> Option<FeedItem> {
        match self.rx.try_recv() {
            Ok(update) => Some(FeedItem::Update(update)),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Lagged(skipped)) => Some(FeedItem::Overrun(skipped)),
            Err(TryRecvError::Closed) => Some(FeedItem::Closed),
        }
    }
}
