//! Source fields: per-cell velocity overrides authored by the driver

use glam::Vec2;

use crate::backend::TextureHandle;
use crate::error::{PreconditionViolation, SetupError};
use crate::grid::{Grid, Texel};

/// CPU-side W×H array of `(fx, fy, 0, mask)` texels.
///
/// A cell with `mask > 0` is pinned: every pass writes its forced velocity
/// there. Everything else follows the simulated dynamics.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceField {
    grid: Grid,
    texels: Vec<Texel>,
}

impl SourceField {
    pub fn new(width: u32, height: u32) -> Result<Self, SetupError> {
        let grid = Grid::new(width, height)?;
        Ok(Self {
            grid,
            texels: grid.zeroed(),
        })
    }

    /// Pins every edge cell to `speed` pointing into the domain.
    pub fn with_boundary_inflow(mut self, speed: f32) -> Self {
        let (w, h) = (self.grid.width(), self.grid.height());
        for col in 0..w {
            self.pin(col, 0, Vec2::new(0.0, speed));
            self.pin(col, h - 1, Vec2::new(0.0, -speed));
        }
        for row in 0..h {
            self.pin(0, row, Vec2::new(speed, 0.0));
            self.pin(w - 1, row, Vec2::new(-speed, 0.0));
        }
        self
    }

    /// Boundary inflow plus four 2×2 diagonal streams around the centre.
    ///
    /// Streams sit a fifth of the grid off centre on the left, right, top and
    /// bottom edges, each aimed diagonally into the domain.
    pub fn reference_layout(
        width: u32,
        height: u32,
        boundary_speed: f32,
        stream_speed: f32,
    ) -> Result<Self, SetupError> {
        let mut field = Self::new(width, height)?.with_boundary_inflow(boundary_speed);
        let (cx, cy) = (width / 2, height / 2);
        let (gx, gy) = (width / 5, height / 5);
        let v = stream_speed;

        field.add_stream(1, cy + gy, 2, 2, Vec2::new(v, -v));
        field.add_stream(width.saturating_sub(3), cy.saturating_sub(gy), 2, 2, Vec2::new(-v, v));
        field.add_stream(cx.saturating_sub(gx), 1, 2, 2, Vec2::new(v, v));
        field.add_stream(cx + gx, height.saturating_sub(3), 2, 2, Vec2::new(-v, -v));

        Ok(field)
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn width(&self) -> u32 {
        self.grid.width()
    }

    pub fn height(&self) -> u32 {
        self.grid.height()
    }

    pub fn texels(&self) -> &[Texel] {
        &self.texels
    }

    fn check(&self, col: u32, row: u32) -> Result<usize, PreconditionViolation> {
        if !self.grid.contains(col, row) {
            return Err(PreconditionViolation::CellOutOfRange {
                col,
                row,
                width: self.grid.width(),
                height: self.grid.height(),
            });
        }
        Ok(self.grid.index(col, row))
    }

    fn pin(&mut self, col: u32, row: u32, velocity: Vec2) {
        let idx = self.grid.index(col, row);
        self.texels[idx] = [velocity.x, velocity.y, 0.0, 1.0];
    }

    /// Pins one cell to `velocity`.
    pub fn set(&mut self, col: u32, row: u32, velocity: Vec2) -> Result<(), PreconditionViolation> {
        self.check(col, row)?;
        self.pin(col, row, velocity);
        Ok(())
    }

    /// Releases one cell back to the simulated dynamics.
    pub fn clear(&mut self, col: u32, row: u32) -> Result<(), PreconditionViolation> {
        let idx = self.check(col, row)?;
        self.texels[idx] = [0.0; 4];
        Ok(())
    }

    pub fn clear_all(&mut self) {
        self.texels.fill([0.0; 4]);
    }

    /// Pins a `width`×`height` rectangle of cells starting at `(col, row)`.
    ///
    /// The rectangle is clipped to the grid; returns the number of cells pinned.
    pub fn add_stream(&mut self, col: u32, row: u32, width: u32, height: u32, velocity: Vec2) -> usize {
        let col_end = col.saturating_add(width).min(self.grid.width());
        let row_end = row.saturating_add(height).min(self.grid.height());
        let mut pinned = 0;
        for r in row..row_end {
            for c in col..col_end {
                self.pin(c, r, velocity);
                pinned += 1;
            }
        }
        if pinned < width as usize * height as usize {
            log::warn!(
                "stream at ({col}, {row}) size {width}x{height} clipped to {pinned} cells"
            );
        }
        pinned
    }

    pub fn is_pinned(&self, col: u32, row: u32) -> bool {
        self.grid.contains(col, row) && self.texels[self.grid.index(col, row)][3] > 0.0
    }

    /// Forced velocity of a pinned cell, `None` for free or out-of-range cells.
    pub fn velocity(&self, col: u32, row: u32) -> Option<Vec2> {
        if !self.is_pinned(col, row) {
            return None;
        }
        let t = self.texels[self.grid.index(col, row)];
        Some(Vec2::new(t[0], t[1]))
    }

    pub fn pinned_count(&self) -> usize {
        self.texels.iter().filter(|t| t[3] > 0.0).count()
    }
}

/// A source field uploaded to a backend texture.
///
/// Only [`Simulation::create_source`](crate::Simulation::create_source) makes these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTexture {
    pub(crate) handle: TextureHandle,
    pub(crate) grid: Grid,
}

impl SourceTexture {
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }
}
