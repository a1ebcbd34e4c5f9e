//! Structural placement heuristics that ignore live hazard geometry.

use blastgrid_core::{Direction, Position, TileKind};
use blastgrid_world::Grid;

/// Counts the rays from `position` that end on an indestructible wall
/// within `blast_distance` tiles.
///
/// Rays stopping on a destructible block, at the grid edge or at the end of
/// their range score nothing.
#[must_use]
pub fn potential_blast_score(grid: &Grid, position: Position, blast_distance: u32) -> u32 {
    Direction::ALL
        .iter()
        .filter(|&&direction| {
            grid.cast_ray(position, direction, blast_distance).stop()
                == Some(TileKind::IndestructibleWall)
        })
        .count() as u32
}

/// Wall proximity map used as an optional follow-up bonus.
///
/// The heat of a tile is the sum of `0.5^d` over every wall, where `d` is
/// the manhattan distance to that wall.
#[derive(Clone, Debug)]
pub struct HeatMap {
    walls: Vec<Position>,
    weight: f64,
}

impl HeatMap {
    /// Collects the walls of `grid`, scaling every reading by `weight`.
    #[must_use]
    pub fn new(grid: &Grid, weight: f64) -> Self {
        let walls = grid
            .positions()
            .filter(|&position| grid.kind_at(position) == Some(TileKind::IndestructibleWall))
            .collect();
        Self { walls, weight }
    }

    /// Raw heat at `position`.
    #[must_use]
    pub fn heat(&self, position: Position) -> f64 {
        self.walls
            .iter()
            .map(|wall| {
                let distance = i32::try_from(wall.manhattan_distance(position)).unwrap_or(i32::MAX);
                0.5_f64.powi(distance)
            })
            .sum()
    }

    /// Weighted heat at `position`.
    #[must_use]
    pub fn weighted(&self, position: Position) -> f64 {
        self.weight * self.heat(position)
    }
}
