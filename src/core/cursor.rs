//! Cursor position and movement
//!
//! Movement saturates at the grid edges; it never wraps to the opposite side.

use serde::{Deserialize, Serialize};

use super::input::Direction;
use super::terminal::Geometry;

/// Zero-based cursor position: `x` is the column, `y` the row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pub x: u16,
    pub y: u16,
}

/// Which coordinate each direction key moves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisMapping {
    /// Up/Down move along `x`, Left/Right along `y`.
    ///
    /// Up decrements `x`, Down increments it; Left increments `y`, Right
    /// decrements it. This is the historical key layout of the editor.
    #[default]
    Transposed,
    /// Up/Down move between rows, Left/Right between columns.
    Conventional,
}

impl Cursor {
    #[allow(dead_code)]
    pub fn new(x: u16, y: u16) -> Self {
        Self { x, y }
    }

    /// Move one cell in `direction`, clamped to `geometry`.
    pub fn step(&mut self, direction: Direction, geometry: Geometry, mapping: AxisMapping) {
        match (mapping, direction) {
            (AxisMapping::Transposed, Direction::Up) => self.x = self.x.saturating_sub(1),
            (AxisMapping::Transposed, Direction::Down) => {
                self.x = self.x.saturating_add(1).min(geometry.last_col())
            }
            (AxisMapping::Transposed, Direction::Left) => {
                self.y = self.y.saturating_add(1).min(geometry.last_row())
            }
            (AxisMapping::Transposed, Direction::Right) => self.y = self.y.saturating_sub(1),

            (AxisMapping::Conventional, Direction::Up) => self.y = self.y.saturating_sub(1),
            (AxisMapping::Conventional, Direction::Down) => {
                self.y = self.y.saturating_add(1).min(geometry.last_row())
            }
            (AxisMapping::Conventional, Direction::Left) => self.x = self.x.saturating_sub(1),
            (AxisMapping::Conventional, Direction::Right) => {
                self.x = self.x.saturating_add(1).min(geometry.last_col())
            }
        }
    }

    #[allow(dead_code)]
    pub fn is_within(&self, geometry: Geometry) -> bool {
        self.x <= geometry.last_col() && self.y <= geometry.last_row()
    }
}
