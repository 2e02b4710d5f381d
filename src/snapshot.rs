//! CPU copies of a velocity field and point queries into them

use glam::Vec2;

use crate::error::PreconditionViolation;
use crate::grid::{Grid, Texel};
use crate::source::SourceField;

/// Anything that can be viewed as a W×H grid of velocities.
pub trait FieldData {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn velocity_at(&self, col: usize, row: usize) -> Vec2;
}

/// The foreground field as read back after a step.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSnapshot {
    grid: Grid,
    texels: Vec<Texel>,
}

impl FieldSnapshot {
    pub fn new(grid: Grid, texels: Vec<Texel>) -> Result<Self, PreconditionViolation> {
        if texels.len() != grid.len() {
            return Err(PreconditionViolation::FieldLength {
                expected: grid.len(),
                actual: texels.len(),
            });
        }
        Ok(Self { grid, texels })
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn texels(&self) -> &[Texel] {
        &self.texels
    }

    /// Velocity under a normalized point `(x, y)`.
    ///
    /// Indexes `floor(H*y)*W + floor(W*x)`. Anything outside `[0, 1)` on either
    /// axis, non-finite input, or an index past the buffer yields zero so that
    /// agents drifting off the domain never stop the frame.
    pub fn sample(&self, x: f32, y: f32) -> Vec2 {
        if !(0.0..1.0).contains(&x) || !(0.0..1.0).contains(&y) {
            return Vec2::ZERO;
        }
        let w = self.grid.width() as usize;
        let h = self.grid.height() as usize;
        let col = (w as f32 * x).floor() as usize;
        let row = (h as f32 * y).floor() as usize;
        match self.texels.get(row * w + col) {
            Some(t) if col < w => Vec2::new(t[0], t[1]),
            _ => Vec2::ZERO,
        }
    }

    pub fn velocity(&self, col: u32, row: u32) -> Option<Vec2> {
        if !self.grid.contains(col, row) {
            return None;
        }
        let t = self.texels[self.grid.index(col, row)];
        Some(Vec2::new(t[0], t[1]))
    }

    pub fn max_speed(&self) -> f32 {
        self.texels
            .iter()
            .map(|t| Vec2::new(t[0], t[1]).length())
            .fold(0.0, f32::max)
    }
}

impl FieldData for FieldSnapshot {
    fn width(&self) -> usize {
        self.grid.width() as usize
    }

    fn height(&self) -> usize {
        self.grid.height() as usize
    }

    fn velocity_at(&self, col: usize, row: usize) -> Vec2 {
        let (width, height) = (self.width(), self.height());
        if col >= width || row >= height {
            return Vec2::ZERO;
        }
        self.texels
            .get(row * width + col)
            .map_or(Vec2::ZERO, |t| Vec2::new(t[0], t[1]))
    }
}

impl FieldData for SourceField {
    fn width(&self) -> usize {
        self.grid().width() as usize
    }

    fn height(&self) -> usize {
        self.grid().height() as usize
    }

    fn velocity_at(&self, col: usize, row: usize) -> Vec2 {
        self.velocity(col as u32, row as u32).unwrap_or(Vec2::ZERO)
    }
}
