use std::fmt;

pub const TILE_EXTENSION: &str = ".png";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoordinate {
    pub x: u32,
    pub y: u32,
}

impl TileCoordinate {
    pub fn new(x: u32, y: u32) -> Self {
        TileCoordinate { x, y }
    }

    pub fn file_name(&self) -> String {
        format!("{}_{}{}", self.x, self.y, TILE_EXTENSION)
    }

    /// Substitutes `{x}` and `{y}` in `template`.
    pub fn url(&self, template: &str) -> String {
        template
            .replace("{x}", &self.x.to_string())
            .replace("{y}", &self.y.to_string())
    }

    /// Inverse of [`TileCoordinate::file_name`]: only the canonical spelling is
    /// accepted, so `01_2.png` is rejected.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let stem = name.strip_suffix(TILE_EXTENSION)?;
        let (x, y) = stem.split_once('_')?;
        if !is_decimal(x) || !is_decimal(y) {
            return None;
        }
        Some(TileCoordinate {
            x: x.parse().ok()?,
            y: y.parse().ok()?,
        })
    }
}

fn is_decimal(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) && (s == "0" || !s.starts_with('0'))
}

impl fmt::Display for TileCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Closed rectangle of tile coordinates, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    pub x_min: u32,
    pub x_max: u32,
    pub y_min: u32,
    pub y_max: u32,
}

impl TileBounds {
    pub fn new(x_min: u32, x_max: u32, y_min: u32, y_max: u32) -> Self {
        TileBounds {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x_min > self.x_max || self.y_min > self.y_max
    }

    /// Number of tiles, saturating at `u64::MAX` for the full `u32` grid.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let width = u64::from(self.x_max - self.x_min) + 1;
        let height = u64::from(self.y_max - self.y_min) + 1;
        width.saturating_mul(height)
    }

    /// Row-major walk: x ascending, and for each x, y ascending.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            bounds: *self,
            next: if self.is_empty() {
                None
            } else {
                Some(TileCoordinate::new(self.x_min, self.y_min))
            },
        }
    }

    /// Smallest rectangle containing every coordinate, or `None` if there are none.
    pub fn covering<I>(coords: I) -> Option<Self>
    where
        I: IntoIterator<Item = TileCoordinate>,
    {
        coords.into_iter().fold(None, |acc, c| {
            Some(match acc {
                None => TileBounds::new(c.x, c.x, c.y, c.y),
                Some(b) => TileBounds::new(
                    b.x_min.min(c.x),
                    b.x_max.max(c.x),
                    b.y_min.min(c.y),
                    b.y_max.max(c.y),
                ),
            })
        })
    }
}

impl fmt::Display for TileBounds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x {}..={}, y {}..={}",
            self.x_min, self.x_max, self.y_min, self.y_max
        )
    }
}

#[derive(Debug, Clone)]
pub struct Coordinates {
    bounds: TileBounds,
    next: Option<TileCoordinate>,
}

impl Iterator for Coordinates {
    type Item = TileCoordinate;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        let b = &self.bounds;
        self.next = if current.y < b.y_max {
            Some(TileCoordinate::new(current.x, current.y + 1))
        } else if current.x < b.x_max {
            Some(TileCoordinate::new(current.x + 1, b.y_min))
        } else {
            None
        };
        Some(current)
    }
}
