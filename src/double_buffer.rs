//! Render targets and the foreground/background pair

use crate::backend::{Backend, TextureHandle};
use crate::error::SetupError;
use crate::grid::Grid;

/// A float texture sized to the grid that passes can both sample and draw into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    handle: TextureHandle,
    grid: Grid,
}

impl RenderTarget {
    pub fn create<B: Backend>(backend: &mut B, grid: Grid, label: &str) -> Result<Self, SetupError> {
        let handle = backend.create_render_target(grid, label)?;
        Ok(Self { handle, grid })
    }

    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }
}

/// Two render targets; `front` indexes the one holding the latest field.
///
/// [`swap`](Self::swap) is the only way to change which one that is.
#[derive(Debug)]
pub struct DoubleBuffer {
    targets: [RenderTarget; 2],
    front: usize,
}

impl DoubleBuffer {
    pub fn create<B: Backend>(backend: &mut B, grid: Grid) -> Result<Self, SetupError> {
        let a = RenderTarget::create(backend, grid, "Velocity Target A")?;
        let b = RenderTarget::create(backend, grid, "Velocity Target B")?;
        Ok(Self {
            targets: [a, b],
            front: 0,
        })
    }

    /// The most recently written, authoritative target.
    pub fn foreground(&self) -> &RenderTarget {
        &self.targets[self.front]
    }

    /// The previous field, read-only input for the next pass.
    pub fn background(&self) -> &RenderTarget {
        &self.targets[1 - self.front]
    }

    pub fn swap(&mut self) {
        self.front = 1 - self.front;
    }
}
