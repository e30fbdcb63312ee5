use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type SessionId = u32;
pub type Sequence = u64;

const MAX_COLOR_LEN: usize = 32;

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct Coordinate {
    pub x: i32,
    pub y: i32,
}

impl Coordinate {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Persisted key form, `"x:y"`.
impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseCoordinateError(String);

impl fmt::Display for ParseCoordinateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid cell key: {:?}", self.0)
    }
}

impl std::error::Error for ParseCoordinateError {}

impl FromStr for Coordinate {
    type Err = ParseCoordinateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseCoordinateError(s.to_owned());
        let (x, y) = s.split_once(':').ok_or_else(err)?;
        Ok(Self {
            x: x.trim().parse().map_err(|_| err())?,
            y: y.trim().parse().map_err(|_| err())?,
        })
    }
}

/// Opaque color token, e.g. `"#ff0000"` or `"red"`.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Color(String);

impl Color {
    /// Returns `None` for empty or oversized tokens.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_COLOR_LEN {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rectangular region with inclusive bounds.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Viewport {
    pub fn new(min_x: i32, min_y: i32, max_x: i32, max_y: i32) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub fn all() -> Self {
        Self::new(i32::MIN, i32::MIN, i32::MAX, i32::MAX)
    }

    /// `width`/`height` cells starting at (x, y). A zero-sized rectangle
    /// still covers its origin.
    pub fn from_origin(x: i32, y: i32, width: u32, height: u32) -> Self {
        let span = |origin: i32, len: u32| {
            let end = origin as i64 + len.saturating_sub(1) as i64;
            end.min(i32::MAX as i64) as i32
        };
        Self::new(x, y, span(x, width), span(y, height))
    }

    pub fn contains(&self, coordinate: &Coordinate) -> bool {
        (self.min_x..=self.max_x).contains(&coordinate.x)
            && (self.min_y..=self.max_y).contains(&coordinate.y)
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x || self.min_y > self.max_y
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
    pub color: Color,
}

impl Cell {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.x, self.y)
    }
}

/// One accepted write. Never mutated after the store creates it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Update {
    pub sequence: Sequence,
    pub coordinate: Coordinate,
    pub color: Color,
}

/// Region read as of `sequence`: every update up to and including it is
/// reflected, none after it.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub sequence: Sequence,
    pub cells: Vec<Cell>,
}

impl Snapshot {
    pub fn color_at(&self, coordinate: &Coordinate) -> Option<&Color> {
        self.cells
            .binary_search_by(|cell| cell.coordinate().cmp(coordinate))
            .ok()
            .map(|index| &self.cells[index].color)
    }
}
