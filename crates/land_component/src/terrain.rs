//! Terrain grid and the collision query.
//!
//! A [`MapChunk`] is a rectangular grid of [`Terrain`] cells stored row-major.
//! The server owns the authoritative chunk and ships a full copy to each
//! client on request. Collision is a single point query, [`Passable`].
//!
//! A chunk decoded from the wire is checked for shape before it exists: the
//! cell vector must hold exactly `width * height` cells.

use land_math::Position;
use serde::{Deserialize, Serialize};

/// The surface of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Terrain {
    /// Open ground.
    Floor,
    /// Solid rock.
    Wall,
    /// Deep water.
    Water,
}

impl Terrain {
    /// Parse a terrain glyph. Unknown glyphs yield `None`.
    #[must_use]
    pub fn from_glyph(glyph: char) -> Option<Self> {
        match glyph {
            '.' => Some(Terrain::Floor),
            '#' => Some(Terrain::Wall),
            '~' => Some(Terrain::Water),
            _ => None,
        }
    }

    /// The character used to draw this terrain.
    #[must_use]
    pub const fn glyph(self) -> char {
        match self {
            Terrain::Floor => '.',
            Terrain::Wall => '#',
            Terrain::Water => '~',
        }
    }

    /// Returns `true` if an entity may stand on this terrain.
    #[must_use]
    pub const fn is_passable(self) -> bool {
        matches!(self, Terrain::Floor)
    }
}

/// The collision surface: can an entity occupy `position`?
pub trait Passable {
    /// Returns `true` if `position` can be entered.
    fn is_passable(&self, position: Position) -> bool;
}

/// A cell vector that does not fit the stated dimensions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("a {width}x{height} map cannot hold {cells} cells")]
pub struct MapShapeError {
    /// Stated width.
    pub width: u32,
    /// Stated height.
    pub height: u32,
    /// Cells actually supplied.
    pub cells: usize,
}

/// Wire form of [`MapChunk`], before the shape check.
#[derive(Deserialize)]
struct RawMapChunk {
    width: u32,
    height: u32,
    cells: Vec<Terrain>,
}

impl TryFrom<RawMapChunk> for MapChunk {
    type Error = MapShapeError;

    fn try_from(raw: RawMapChunk) -> Result<Self, Self::Error> {
        MapChunk::from_cells(raw.width, raw.height, raw.cells)
    }
}

/// A rectangular terrain grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawMapChunk")]
pub struct MapChunk {
    width: u32,
    height: u32,
    /// Row-major cells. Length is always `width * height`.
    cells: Vec<Terrain>,
}

impl MapChunk {
    /// Create a chunk filled with [`Terrain::Floor`].
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![Terrain::Floor; width as usize * height as usize],
        }
    }

    /// Create a chunk from row-major cells.
    ///
    /// # Errors
    ///
    /// Returns [`MapShapeError`] unless `cells` holds exactly
    /// `width * height` cells.
    pub fn from_cells(width: u32, height: u32, cells: Vec<Terrain>) -> Result<Self, MapShapeError> {
        let expected = (width as usize).checked_mul(height as usize);
        if expected != Some(cells.len()) {
            return Err(MapShapeError {
                width,
                height,
                cells: cells.len(),
            });
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// Create a chunk of floor enclosed by a one-cell wall border.
    #[must_use]
    pub fn bordered(width: u32, height: u32) -> Self {
        let mut chunk = Self::new(width, height);
        let (w, h) = (width as i32, height as i32);
        for x in 0..w {
            chunk.set(Position::new(x, 0), Terrain::Wall);
            chunk.set(Position::new(x, h - 1), Terrain::Wall);
        }
        for y in 0..h {
            chunk.set(Position::new(0, y), Terrain::Wall);
            chunk.set(Position::new(w - 1, y), Terrain::Wall);
        }
        chunk
    }

    /// Build a chunk from text rows of terrain glyphs.
    ///
    /// Rows shorter than the longest row are padded with floor; unknown
    /// glyphs become floor.
    #[must_use]
    pub fn from_rows(rows: &[&str]) -> Self {
        let width = rows.iter().map(|r| r.chars().count()).max().unwrap_or(0) as u32;
        let mut chunk = Self::new(width, rows.len() as u32);
        for (y, row) in rows.iter().enumerate() {
            for (x, glyph) in row.chars().enumerate() {
                let terrain = Terrain::from_glyph(glyph).unwrap_or(Terrain::Floor);
                chunk.set(Position::new(x as i32, y as i32), terrain);
            }
        }
        chunk
    }

    /// Width in cells.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in cells.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns `true` if `position` lies inside the chunk.
    #[must_use]
    pub fn contains(&self, position: Position) -> bool {
        self.offset(position).is_some()
    }

    /// The terrain at `position`, or `None` if out of bounds.
    #[must_use]
    pub fn get(&self, position: Position) -> Option<Terrain> {
        self.offset(position).and_then(|i| self.cells.get(i).copied())
    }

    /// Overwrite the terrain at `position`. Out-of-bounds writes are ignored
    /// and return `false`.
    pub fn set(&mut self, position: Position, terrain: Terrain) -> bool {
        match self.offset(position) {
            Some(i) => {
                self.cells[i] = terrain;
                true
            }
            None => false,
        }
    }

    /// Draw a straight run of `terrain` from `from` (inclusive) for `len`
    /// cells along `step`.
    pub fn line(&mut self, from: Position, step: Position, len: u32, terrain: Terrain) {
        let mut at = from;
        for _ in 0..len {
            self.set(at, terrain);
            at += step;
        }
    }

    /// A passable cell to place new entities on: the centre if it is free,
    /// otherwise the first passable cell in row-major order.
    #[must_use]
    pub fn spawn_point(&self) -> Option<Position> {
        let centre = Position::new(self.width as i32 / 2, self.height as i32 / 2);
        if self.is_passable(centre) {
            return Some(centre);
        }
        self.cells
            .iter()
            .position(|t| t.is_passable())
            .map(|i| self.position_of(i))
    }

    /// Iterate over every cell with its position, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (Position, Terrain)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, t)| (self.position_of(i), *t))
    }

    fn offset(&self, position: Position) -> Option<usize> {
        let in_x = position.x >= 0 && (position.x as u32) < self.width;
        let in_y = position.y >= 0 && (position.y as u32) < self.height;
        (in_x && in_y).then(|| position.y as usize * self.width as usize + position.x as usize)
    }

    fn position_of(&self, index: usize) -> Position {
        let w = self.width as usize;
        Position::new((index % w) as i32, (index / w) as i32)
    }
}

impl Passable for MapChunk {
    fn is_passable(&self, position: Position) -> bool {
        self.get(position).is_some_and(Terrain::is_passable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bordered_walls() {
        let chunk = MapChunk::bordered(5, 4);
        assert_eq!(chunk.get(Position::new(0, 0)), Some(Terrain::Wall));
        assert_eq!(chunk.get(Position::new(4, 3)), Some(Terrain::Wall));
        assert_eq!(chunk.get(Position::new(2, 2)), Some(Terrain::Floor));
        assert!(chunk.is_passable(Position::new(1, 1)));
        assert!(!chunk.is_passable(Position::new(0, 2)));
    }

    #[test]
    fn test_out_of_bounds_is_impassable() {
        let chunk = MapChunk::new(3, 3);
        assert!(!chunk.is_passable(Position::new(-1, 0)));
        assert!(!chunk.is_passable(Position::new(3, 0)));
        assert!(!chunk.is_passable(Position::new(0, 3)));
        assert_eq!(chunk.get(Position::new(5, 5)), None);
    }

    #[test]
    fn test_from_rows() {
        let chunk = MapChunk::from_rows(&["###", "#.~", "#"]);
        assert_eq!(chunk.width(), 3);
        assert_eq!(chunk.height(), 3);
        assert_eq!(chunk.get(Position::new(1, 1)), Some(Terrain::Floor));
        assert_eq!(chunk.get(Position::new(2, 1)), Some(Terrain::Water));
        // Padded with floor.
        assert_eq!(chunk.get(Position::new(2, 2)), Some(Terrain::Floor));
        assert!(!chunk.is_passable(Position::new(2, 1)));
    }

    #[test]
    fn test_line() {
        let mut chunk = MapChunk::new(6, 6);
        chunk.line(Position::new(1, 4), Position::new(1, 0), 4, Terrain::Wall);
        for x in 1..5 {
            assert_eq!(chunk.get(Position::new(x, 4)), Some(Terrain::Wall));
        }
        assert_eq!(chunk.get(Position::new(5, 4)), Some(Terrain::Floor));
    }

    #[test]
    fn test_spawn_point_avoids_walls() {
        let mut chunk = MapChunk::bordered(5, 5);
        assert_eq!(chunk.spawn_point(), Some(Position::new(2, 2)));
        chunk.set(Position::new(2, 2), Terrain::Wall);
        assert_eq!(chunk.spawn_point(), Some(Position::new(1, 1)));

        let solid = MapChunk::from_rows(&["##", "##"]);
        assert_eq!(solid.spawn_point(), None);
    }

    #[test]
    fn test_cells_iterates_row_major() {
        let chunk = MapChunk::from_rows(&["#.", ".~"]);
        let cells: Vec<_> = chunk.cells().collect();
        assert_eq!(cells[1], (Position::new(1, 0), Terrain::Floor));
        assert_eq!(cells[3], (Position::new(1, 1), Terrain::Water));
    }

    #[test]
    fn test_serialization_roundtrip() {
        let chunk = MapChunk::bordered(8, 6);
        let bytes = rmp_serde::to_vec(&chunk).unwrap();
        let restored: MapChunk = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(chunk, restored);
    }

    #[derive(Serialize)]
    struct LooseChunk {
        width: u32,
        height: u32,
        cells: Vec<Terrain>,
    }

    #[test]
    fn test_decoding_rejects_wrong_shape() {
        for (width, height, cells) in [(10, 10, 0), (3, 3, 8), (0, 4, 2)] {
            let bytes = rmp_serde::to_vec(&LooseChunk {
                width,
                height,
                cells: vec![Terrain::Floor; cells],
            })
            .unwrap();
            assert!(
                rmp_serde::from_slice::<MapChunk>(&bytes).is_err(),
                "{width}x{height} with {cells} cells"
            );
        }
    }

    #[test]
    fn test_from_cells() {
        let chunk = MapChunk::from_cells(2, 1, vec![Terrain::Wall, Terrain::Floor]).unwrap();
        assert!(chunk.is_passable(Position::new(1, 0)));
        assert_eq!(
            MapChunk::from_cells(2, 2, vec![Terrain::Floor]),
            Err(MapShapeError {
                width: 2,
                height: 2,
                cells: 1
            })
        );
        assert!(MapChunk::from_cells(0, 0, Vec::new()).is_ok());
    }
}
