use thiserror::Error;

use crate::geometry::{Rect, TileCoord, Vec2, TILE_SIZE};

const ROW_SOLID: char = '#';
const ROW_ENCOUNTER: char = '"';
const ROW_FLOOR: char = '.';

/// Static tile layers of one map.
///
/// Tile `(x, y)` covers the pixel square `[x * TILE_SIZE, (x + 1) * TILE_SIZE)`
/// on both axes, with y growing downward. Layers are built once when the map
/// is loaded and never mutated by the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tilemap {
    width: u32,
    height: u32,
    solid: Vec<bool>,
    encounter: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TilemapError {
    #[error("{layer} layer tile count mismatch: expected {expected}, got {actual}")]
    TileCountMismatch {
        layer: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("row {row} has {actual} tiles, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("unknown tile glyph '{glyph}' at ({x}, {y})")]
    UnknownGlyph { glyph: char, x: usize, y: usize },
}

impl Tilemap {
    pub fn new(width: u32, height: u32, solid: Vec<bool>) -> Result<Self, TilemapError> {
        let expected = width as usize * height as usize;
        if solid.len() != expected {
            return Err(TilemapError::TileCountMismatch {
                layer: "collision",
                expected,
                actual: solid.len(),
            });
        }
        Ok(Self {
            width,
            height,
            solid,
            encounter: vec![false; expected],
        })
    }

    pub fn open(width: u32, height: u32) -> Self {
        let count = width as usize * height as usize;
        Self {
            width,
            height,
            solid: vec![false; count],
            encounter: vec![false; count],
        }
    }

    pub fn with_encounter_layer(mut self, encounter: Vec<bool>) -> Result<Self, TilemapError> {
        if encounter.len() != self.solid.len() {
            return Err(TilemapError::TileCountMismatch {
                layer: "encounter",
                expected: self.solid.len(),
                actual: encounter.len(),
            });
        }
        self.encounter = encounter;
        Ok(self)
    }

    /// Builds a map from text rows: `#` solid, `"` encounter grass, `.` floor.
    pub fn from_rows(rows: &[&str]) -> Result<Self, TilemapError> {
        let width = rows.first().map(|row| row.chars().count()).unwrap_or(0);
        let mut solid = Vec::with_capacity(width * rows.len());
        let mut encounter = Vec::with_capacity(width * rows.len());
        for (y, row) in rows.iter().enumerate() {
            let actual = row.chars().count();
            if actual != width {
                return Err(TilemapError::RaggedRow {
                    row: y,
                    expected: width,
                    actual,
                });
            }
            for (x, glyph) in row.chars().enumerate() {
                match glyph {
                    ROW_SOLID => {
                        solid.push(true);
                        encounter.push(false);
                    }
                    ROW_ENCOUNTER => {
                        solid.push(false);
                        encounter.push(true);
                    }
                    ROW_FLOOR => {
                        solid.push(false);
                        encounter.push(false);
                    }
                    glyph => return Err(TilemapError::UnknownGlyph { glyph, x, y }),
                }
            }
        }
        Self::new(width as u32, rows.len() as u32, solid)?.with_encounter_layer(encounter)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixel_size(&self) -> Vec2 {
        Vec2 {
            x: self.width as f32 * TILE_SIZE,
            y: self.height as f32 * TILE_SIZE,
        }
    }

    pub fn in_bounds(&self, tile: TileCoord) -> bool {
        self.index_of(tile).is_some()
    }

    pub fn index_of(&self, tile: TileCoord) -> Option<usize> {
        if tile.x < 0 || tile.y < 0 {
            return None;
        }
        let (x, y) = (tile.x as u32, tile.y as u32);
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(y as usize * self.width as usize + x as usize)
    }

    pub fn is_solid(&self, tile: TileCoord) -> bool {
        self.index_of(tile)
            .and_then(|index| self.solid.get(index))
            .copied()
            .unwrap_or(false)
    }

    pub fn is_encounter(&self, tile: TileCoord) -> bool {
        self.index_of(tile)
            .and_then(|index| self.encounter.get(index))
            .copied()
            .unwrap_or(false)
    }

    pub fn solid_tile_count(&self) -> usize {
        self.solid.iter().filter(|solid| **solid).count()
    }

    /// One rectangle per solid tile, row-major.
    pub fn collision_rects(&self) -> impl Iterator<Item = Rect> + '_ {
        let width = self.width as usize;
        self.solid
            .iter()
            .enumerate()
            .filter(|(_, solid)| **solid)
            .map(move |(index, _)| {
                Rect::tile(TileCoord::new((index % width) as i32, (index / width) as i32))
            })
    }

    /// True when `rect` overlaps any solid tile. Only the tiles the rectangle
    /// spans are probed, so the cost is independent of the map size.
    pub fn check_collision(&self, rect: Rect) -> bool {
        self.any_overlapping_tile(rect, |tile| self.is_solid(tile))
    }

    pub fn overlaps_encounter(&self, rect: Rect) -> bool {
        self.any_overlapping_tile(rect, |tile| self.is_encounter(tile))
    }

    fn any_overlapping_tile(&self, rect: Rect, mut predicate: impl FnMut(TileCoord) -> bool) -> bool {
        if rect.is_empty() || self.width == 0 || self.height == 0 {
            return false;
        }
        let first_x = ((rect.x / TILE_SIZE).floor() as i64).max(0);
        let first_y = ((rect.y / TILE_SIZE).floor() as i64).max(0);
        let last_x = ((rect.right() / TILE_SIZE).ceil() as i64 - 1).min(self.width as i64 - 1);
        let last_y = ((rect.bottom() / TILE_SIZE).ceil() as i64 - 1).min(self.height as i64 - 1);

        for y in first_y..=last_y {
            for x in first_x..=last_x {
                let tile = TileCoord::new(x as i32, y as i32);
                if predicate(tile) && Rect::tile(tile).intersects(&rect) {
                    return true;
                }
            }
        }
        false
    }
}
