//! Dense tile map rebuilt from every map snapshot.

use blastgrid_core::{Direction, GridError, Position, TileKind};

/// Immutable-per-snapshot tile map stored in row-major order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Grid {
    columns: u32,
    rows: u32,
    tiles: Vec<TileKind>,
}

impl Grid {
    /// Parses a newline-delimited snapshot, one character per tile.
    ///
    /// Trailing blank lines are ignored. Every remaining row must match the
    /// length of the first one and the grid must fit inside a
    /// `bound` x `bound` square.
    pub fn parse(snapshot: &str, bound: u32) -> Result<Self, GridError> {
        let mut lines: Vec<&str> = snapshot
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .collect();
        while lines.last().is_some_and(|line| line.is_empty()) {
            let _ = lines.pop();
        }

        let Some(first) = lines.first() else {
            return Err(GridError::Empty);
        };
        let columns = first.chars().count() as u32;
        let rows = lines.len() as u32;
        if columns == 0 {
            return Err(GridError::Empty);
        }
        if columns > bound || rows > bound {
            return Err(GridError::ExceedsBound {
                columns,
                rows,
                bound,
            });
        }

        let mut tiles = Vec::with_capacity(columns as usize * rows as usize);
        for (row, line) in lines.iter().enumerate() {
            let row = row as u32;
            let found = line.chars().count() as u32;
            if found != columns {
                return Err(GridError::RaggedRow {
                    row,
                    expected: columns,
                    found,
                });
            }
            for (column, code) in line.chars().enumerate() {
                let kind = TileKind::from_code(code).ok_or(GridError::UnknownTile {
                    code,
                    column: column as u32,
                    row,
                })?;
                tiles.push(kind);
            }
        }

        Ok(Self {
            columns,
            rows,
            tiles,
        })
    }

    /// Number of columns in the grid.
    #[must_use]
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows in the grid.
    #[must_use]
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// Reports whether `position` addresses a tile of this grid.
    #[must_use]
    pub fn in_bounds(&self, position: Position) -> bool {
        self.index(position).is_some()
    }

    /// Kind of the tile at `position`.
    pub fn tile(&self, position: Position) -> Result<TileKind, GridError> {
        self.kind_at(position).ok_or(GridError::OutOfBounds {
            position,
            columns: self.columns,
            rows: self.rows,
        })
    }

    /// Kind of the tile at `position`, or `None` off the grid.
    #[must_use]
    pub fn kind_at(&self, position: Position) -> Option<TileKind> {
        self.index(position)
            .and_then(|index| self.tiles.get(index).copied())
    }

    /// Iterates every position of the grid in row-major order.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.rows).flat_map(move |row| {
            (0..self.columns).map(move |column| Position::new(column as i32, row as i32))
        })
    }

    /// Walks up to `distance` tiles from `origin` in `direction`.
    ///
    /// The ray collects every open tile it passes and stops at the first
    /// tile that is not open; that tile is reported through [`Ray::stop`]
    /// but is not part of [`Ray::tiles`].
    #[must_use]
    pub fn cast_ray(&self, origin: Position, direction: Direction, distance: u32) -> Ray {
        let mut tiles = Vec::new();
        let mut stop = None;
        for step in 1..=distance as i32 {
            let position = origin.offset(direction, step);
            match self.kind_at(position) {
                None => break,
                Some(TileKind::Open) => tiles.push(position),
                Some(kind) => {
                    stop = Some(kind);
                    break;
                }
            }
        }
        Ray { tiles, stop }
    }

    /// Converts a destroyed block into open floor.
    ///
    /// Returns `Ok(false)` when the tile was not a destructible block.
    pub fn clear_block(&mut self, position: Position) -> Result<bool, GridError> {
        let columns = self.columns;
        let rows = self.rows;
        let slot = self
            .index(position)
            .and_then(|index| self.tiles.get_mut(index))
            .ok_or(GridError::OutOfBounds {
                position,
                columns,
                rows,
            })?;

        if *slot == TileKind::DestructibleBlock {
            *slot = TileKind::Open;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn index(&self, position: Position) -> Option<usize> {
        let column = u32::try_from(position.x()).ok()?;
        let row = u32::try_from(position.y()).ok()?;
        if column >= self.columns || row >= self.rows {
            return None;
        }
        let width = usize::try_from(self.columns).ok()?;
        Some(usize::try_from(row).ok()? * width + usize::try_from(column).ok()?)
    }
}

/// Result of walking a straight line across the grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ray {
    tiles: Vec<Position>,
    stop: Option<TileKind>,
}

impl Ray {
    /// Open tiles crossed by the ray, nearest first.
    #[must_use]
    pub fn tiles(&self) -> &[Position] {
        &self.tiles
    }

    /// Kind of the tile that stopped the ray, if it did not run out of range
    /// or off the grid.
    #[must_use]
    pub const fn stop(&self) -> Option<TileKind> {
        self.stop
    }

    /// Consumes the ray, yielding the crossed tiles.
    #[must_use]
    pub fn into_tiles(self) -> Vec<Position> {
        self.tiles
    }
}
