use crate::types::*;
use serde::{Deserialize, Serialize};

/// Frames sent to a viewer's transport.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    Init {
        sequence: Sequence,
        cells: Vec<Cell>,
    },
    Delta {
        sequence: Sequence,
        x: i32,
        y: i32,
        color: Color,
    },
    Stats {
        online: usize,
    },
}

impl OutboundMessage {
    pub fn init(snapshot: Snapshot) -> Self {
        Self::Init {
            sequence: snapshot.sequence,
            cells: snapshot.cells,
        }
    }

    pub fn delta(update: &Update) -> Self {
        Self::Delta {
            sequence: update.sequence,
            x: update.coordinate.x,
            y: update.coordinate.y,
            color: update.color.clone(),
        }
    }

    /// Sequence carried by pixel messages; `None` for stats.
    pub fn sequence(&self) -> Option<Sequence> {
        match self {
            Self::Init { sequence, .. } | Self::Delta { sequence, .. } => Some(*sequence),
            Self::Stats { .. } => None,
        }
    }
}

/// Paint request as sent by clients. The color stays a raw string here so a
/// bad token is answered with `accepted: false` instead of a parse failure.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PaintRequest {
    pub x: i32,
    pub y: i32,
    pub color: String,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct PaintReceipt {
    pub accepted: bool,
    pub sequence: Sequence,
}

/// Frames received from a viewer's transport.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InboundMessage {
    Paint(PaintRequest),
    Viewport { viewport: Viewport },
}
