use glam::Vec2;

use crate::error::{PreconditionViolation, SetupError};

/// One RGBA float cell as stored in every simulation texture.
///
/// Velocity lives in `[0]` and `[1]`; source fields carry their mask in `[3]`.
pub type Texel = [f32; 4];

/// Fixed W×H dimensions shared by every texture of one simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grid {
    width: u32,
    height: u32,
}

impl Grid {
    pub fn new(width: u32, height: u32) -> Result<Self, SetupError> {
        if width == 0 || height == 0 {
            return Err(SetupError::InvalidGrid { width, height });
        }
        Ok(Self { width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Always false; a grid has at least one cell.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Size of one cell in normalized texture coordinates, `(1/W, 1/H)`.
    pub fn texel_size(&self) -> Vec2 {
        Vec2::new(1.0 / self.width as f32, 1.0 / self.height as f32)
    }

    pub fn contains(&self, col: u32, row: u32) -> bool {
        col < self.width && row < self.height
    }

    /// Row-major index, row 0 first.
    pub fn index(&self, col: u32, row: u32) -> usize {
        row as usize * self.width as usize + col as usize
    }

    /// Normalized coordinate of a cell centre.
    pub fn cell_center(&self, col: u32, row: u32) -> Vec2 {
        Vec2::new(
            (col as f32 + 0.5) / self.width as f32,
            (row as f32 + 0.5) / self.height as f32,
        )
    }

    /// Fails with `SourceDimensions` unless `other` is the same size.
    pub fn ensure_matches(&self, other: Grid) -> Result<(), PreconditionViolation> {
        if other != *self {
            return Err(PreconditionViolation::SourceDimensions {
                expected_width: self.width,
                expected_height: self.height,
                actual_width: other.width,
                actual_height: other.height,
            });
        }
        Ok(())
    }

    pub fn zeroed(&self) -> Vec<Texel> {
        vec![[0.0; 4]; self.len()]
    }
}
