use crate::message::OutboundMessage;
use crate::types::*;
use std::collections::HashMap;

/// Viewer-side copy of a region, rebuilt from outbound messages.
#[derive(Debug, Default)]
pub struct CanvasReplica {
    sequence: Sequence,
    cells: HashMap<Coordinate, Color>,
    online: usize,
    applied: Vec<Sequence>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ReplicaError {
    /// Delta before any init.
    NotInitialized,
    /// Message sequence did not move forward.
    OutOfOrder { last: Sequence, found: Sequence },
}

impl CanvasReplica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&mut self, message: &OutboundMessage) -> Result<(), ReplicaError> {
        match message {
            OutboundMessage::Init { sequence, cells } => {
                if !self.applied.is_empty() && *sequence < self.sequence {
                    return Err(ReplicaError::OutOfOrder {
                        last: self.sequence,
                        found: *sequence,
                    });
                }
                log::debug!("Replica reset at sequence {}", sequence);
                self.sequence = *sequence;
                self.cells = cells
                    .iter()
                    .map(|cell| (cell.coordinate(), cell.color.clone()))
                    .collect();
                self.applied.push(*sequence);
            }
            OutboundMessage::Delta {
                sequence,
                x,
                y,
                color,
            } => {
                if self.applied.is_empty() {
                    return Err(ReplicaError::NotInitialized);
                }
                if *sequence <= self.sequence {
                    return Err(ReplicaError::OutOfOrder {
                        last: self.sequence,
                        found: *sequence,
                    });
                }
                self.sequence = *sequence;
                self.cells.insert(Coordinate::new(*x, *y), color.clone());
                self.applied.push(*sequence);
            }
            OutboundMessage::Stats { online } => self.online = *online,
        }
        Ok(())
    }

    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn online(&self) -> usize {
        self.online
    }

    pub fn color_at(&self, coordinate: &Coordinate) -> Option<&Color> {
        self.cells.get(coordinate)
    }

    /// Sequence numbers of every init and delta handled, in order.
    pub fn applied(&self) -> &[Sequence] {
        &self.applied
    }

    /// Whether this replica shows exactly the cells of `snapshot`.
    pub fn matches(&self, snapshot: &Snapshot) -> bool {
        self.cells.len() == snapshot.cells.len()
            && snapshot
                .cells
                .iter()
                .all(|cell| self.cells.get(&cell.coordinate()) == Some(&cell.color))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rejects_delta_before_init_and_stale_deltas() {
        let delta = |sequence| OutboundMessage::Delta {
            sequence,
            x: 0,
            y: 0,
            color: Color::new("red").expect(""),
        };

        let mut replica = CanvasReplica::new();
        assert_eq!(replica.handle(&delta(1)), Err(ReplicaError::NotInitialized));

        replica
            .handle(&OutboundMessage::Init {
                sequence: 3,
                cells: Vec::new(),
            })
            .expect("");
        assert_eq!(
            replica.handle(&delta(3)),
            Err(ReplicaError::OutOfOrder { last: 3, found: 3 })
        );
        replica.handle(&delta(5)).expect("");
        assert_eq!(replica.applied(), &[3, 5]);
        assert_eq!(
            replica.color_at(&Coordinate::new(0, 0)).map(Color::as_str),
            Some("red")
        );
    }
}
