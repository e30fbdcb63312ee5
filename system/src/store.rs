use crate::error::StoreError;
use crate::types::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Durable half of a write, run by the owner outside its lock. The write it
/// belongs to is applied only once the job has succeeded.
pub type PersistJob = Box<dyn FnOnce() -> Result<(), StoreError> + Send>;

/// Authoritative cell storage. Callers serialize access (one owner behind a
/// lock), so `write` and `snapshot` never interleave.
pub trait CanvasStore {
    fn snapshot(&self, viewport: &Viewport) -> Result<Snapshot, StoreError>;

    /// Highest sequence assigned so far.
    fn sequence(&self) -> Sequence;

    /// Makes `update` visible. It must come from `next_update`.
    fn apply(&mut self, update: &Update);

    /// What has to reach durable storage before `update` is applied.
    fn persist_job(&self, _update: &Update) -> Option<PersistJob> {
        None
    }

    /// The update a write to `coordinate` would produce. Nothing changes yet.
    fn next_update(&self, coordinate: Coordinate, color: Color) -> Update {
        Update {
            sequence: self.sequence() + 1,
            coordinate,
            color,
        }
    }

    /// Assigns the next sequence number and stores `color` at `coordinate`.
    /// A failed persist leaves the store untouched.
    fn write(&mut self, coordinate: Coordinate, color: Color) -> Result<Update, StoreError> {
        let update = self.next_update(coordinate, color);
        if let Some(job) = self.persist_job(&update) {
            job()?;
        }
        self.apply(&update);
        Ok(update)
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    sequence: Sequence,
    cells: HashMap<Coordinate, Color>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl CanvasStore for MemoryStore {
    fn snapshot(&self, viewport: &Viewport) -> Result<Snapshot, StoreError> {
        let mut cells = self
            .cells
            .iter()
            .filter(|(coordinate, _)| viewport.contains(coordinate))
            .map(|(coordinate, color)| Cell {
                x: coordinate.x,
                y: coordinate.y,
                color: color.clone(),
            })
            .collect::<Vec<_>>();
        cells.sort_by_key(Cell::coordinate);
        Ok(Snapshot {
            sequence: self.sequence,
            cells,
        })
    }

    fn sequence(&self) -> Sequence {
        self.sequence
    }

    fn apply(&mut self, update: &Update) {
        debug_assert_eq!(update.sequence, self.sequence + 1);
        self.sequence = update.sequence;
        self.cells.insert(update.coordinate, update.color.clone());
    }
}

/// On-disk layout: `{"sequence": n, "cells": {"x:y": color}}`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct CanvasFile {
    sequence: Sequence,
    cells: BTreeMap<String, String>,
}

impl CanvasFile {
    fn save(&self, path: &Path) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(self).map_err(|e| unavailable(path, e))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, bytes).map_err(|e| unavailable(path, e))?;
        fs::rename(&tmp, path).map_err(|e| unavailable(path, e))
    }
}

/// Write-through store persisting the whole canvas after every write.
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
}

impl FileStore {
    /// Loads `path` if it exists, otherwise starts empty.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let memory = match fs::read(&path) {
            Ok(bytes) => {
                let file: CanvasFile =
                    serde_json::from_slice(&bytes).map_err(|e| unavailable(&path, e))?;
                let mut cells = HashMap::with_capacity(file.cells.len());
                for (key, color) in file.cells {
                    let coordinate = key
                        .parse::<Coordinate>()
                        .map_err(|e| unavailable(&path, e))?;
                    let color = Color::new(color).ok_or_else(|| {
                        unavailable(&path, format!("invalid color at {}", coordinate))
                    })?;
                    cells.insert(coordinate, color);
                }
                log::info!(
                    "Loaded {} cells at sequence {} from {}",
                    cells.len(),
                    file.sequence,
                    path.display()
                );
                MemoryStore {
                    sequence: file.sequence,
                    cells,
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MemoryStore::new(),
            Err(e) => return Err(unavailable(&path, e)),
        };
        Ok(Self { path, memory })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CanvasStore for FileStore {
    fn snapshot(&self, viewport: &Viewport) -> Result<Snapshot, StoreError> {
        self.memory.snapshot(viewport)
    }

    fn sequence(&self) -> Sequence {
        self.memory.sequence()
    }

    fn apply(&mut self, update: &Update) {
        self.memory.apply(update)
    }

    fn persist_job(&self, update: &Update) -> Option<PersistJob> {
        let mut cells = self
            .memory
            .cells
            .iter()
            .map(|(coordinate, color)| (coordinate.to_string(), color.as_str().to_string()))
            .collect::<BTreeMap<_, _>>();
        cells.insert(
            update.coordinate.to_string(),
            update.color.as_str().to_string(),
        );
        let file = CanvasFile {
            sequence: update.sequence,
            cells,
        };
        let path = self.path.clone();
        Some(Box::new(move || file.save(&path)))
    }
}

fn unavailable(path: &Path, e: impl fmt::Display) -> StoreError {
    StoreError::Unavailable(format!("{}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color(s: &str) -> Color {
        Color::new(s).expect("valid color")
    }

    #[test]
    fn last_write_wins_per_cell() {
        let mut store = MemoryStore::new();
        let first = store.write(Coordinate::new(1, 1), color("red")).expect("");
        let second = store.write(Coordinate::new(1, 1), color("blue")).expect("");
        assert_eq!(first.sequence, 1);
        assert_eq!(second.sequence, 2);

        let snapshot = store.snapshot(&Viewport::all()).expect("");
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(
            snapshot.color_at(&Coordinate::new(1, 1)),
            Some(&color("blue"))
        );
        assert_eq!(snapshot.cells.len(), 1);
    }

    #[test]
    fn snapshot_is_restricted_to_viewport_and_repeatable() {
        let mut store = MemoryStore::new();
        store.write(Coordinate::new(0, 0), color("red")).expect("");
        store.write(Coordinate::new(50, 50), color("green")).expect("");
        store.write(Coordinate::new(3, 2), color("blue")).expect("");

        let viewport = Viewport::from_origin(0, 0, 10, 10);
        let first = store.snapshot(&viewport).expect("");
        let second = store.snapshot(&viewport).expect("");
        assert_eq!(first, second);
        assert_eq!(first.sequence, 3);
        assert_eq!(
            first.cells.iter().map(Cell::coordinate).collect::<Vec<_>>(),
            vec![Coordinate::new(0, 0), Coordinate::new(3, 2)]
        );
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().expect("");
        let path = dir.path().join("canvas.json");

        let mut store = FileStore::open(&path).expect("");
        store.write(Coordinate::new(1, 2), color("red")).expect("");
        store.write(Coordinate::new(-4, 0), color("blue")).expect("");
        drop(store);

        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).expect("")).expect("");
        assert_eq!(raw["sequence"], 2);
        assert_eq!(raw["cells"]["1:2"], "red");
        assert_eq!(raw["cells"]["-4:0"], "blue");

        let mut reopened = FileStore::open(&path).expect("");
        assert_eq!(reopened.sequence(), 2);
        let update = reopened.write(Coordinate::new(1, 2), color("white")).expect("");
        assert_eq!(update.sequence, 3);
    }

    #[test]
    fn failed_persist_leaves_store_unchanged() {
        let dir = tempfile::tempdir().expect("");
        let path = dir.path().join("canvas.json");
        let mut store = FileStore::open(&path).expect("");
        store.write(Coordinate::new(0, 0), color("red")).expect("");

        dir.close().expect("");

        let result = store.write(Coordinate::new(0, 0), color("blue"));
        assert!(matches!(result, Err(StoreError::Unavailable(_))));
        assert_eq!(store.sequence(), 1);
        let snapshot = store.snapshot(&Viewport::all()).expect("");
        assert_eq!(snapshot.color_at(&Coordinate::new(0, 0)), Some(&color("red")));
    }

    #[test]
    fn corrupt_file_is_reported_unavailable() {
        let dir = tempfile::tempdir().expect("");
        let path = dir.path().join("canvas.json");
        fs::write(&path, b"{\"sequence\": 1, \"cells\": {\"oops\": \"red\"}}").expect("");
        assert!(matches!(
            FileStore::open(&path),
            Err(StoreError::Unavailable(_))
        ));
    }

    #[test]
    fn persist_job_does_not_touch_the_store() {
        let dir = tempfile::tempdir().expect("");
        let path = dir.path().join("canvas.json");
        let mut store = FileStore::open(&path).expect("");
        store.write(Coordinate::new(0, 0), color("red")).expect("");

        let update = store.next_update(Coordinate::new(3, 3), color("blue"));
        let job = store.persist_job(&update).expect("file stores persist");
        assert_eq!(store.sequence(), 1);

        job().expect("");
        assert_eq!(store.sequence(), 1);
        let raw: serde_json::Value =
            serde_json::from_slice(&fs::read(&path).expect("")).expect("");
        assert_eq!(raw["sequence"], 2);
        assert_eq!(raw["cells"]["3:3"], "blue");

        store.apply(&update);
        let snapshot = store.snapshot(&Viewport::all()).expect("");
        assert_eq!(snapshot.sequence, 2);
        assert_eq!(snapshot.color_at(&Coordinate::new(3, 3)), Some(&color("blue")));
    }

    #[test]
    fn invalid_color_on_disk_is_reported_unavailable() {
        let dir = tempfile::tempdir().expect("");
        let path = dir.path().join("canvas.json");
        for bad in ["\"\"".to_string(), format!("\"{}\"", "x".repeat(33))] {
            let body = format!("{{\"sequence\": 1, \"cells\": {{\"0:0\": {}}}}}", bad);
            fs::write(&path, body).expect("");
            assert!(matches!(
                FileStore::open(&path),
                Err(StoreError::Unavailable(_))
            ));
        }
    }
}
