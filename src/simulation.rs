//! The simulation engine: one advection pass then a fixed run of relaxation
//! passes per step, ping-ponging between two render targets.

use glam::Vec2;

use crate::backend::{Backend, TextureHandle};
use crate::config::SimConfig;
use crate::double_buffer::DoubleBuffer;
use crate::error::{FieldError, PreconditionViolation, SetupError};
use crate::grid::{Grid, Texel};
use crate::passes::{self, ADVECT_PROGRAM, RELAX_PROGRAM};
use crate::snapshot::FieldSnapshot;
use crate::source::{SourceField, SourceTexture};

pub struct Simulation<B: Backend> {
    backend: B,
    grid: Grid,
    config: SimConfig,
    buffers: DoubleBuffer,
    advect_program: B::Program,
    relax_program: B::Program,
    snapshot: Option<FieldSnapshot>,
    frame: u64,
}

impl<B: Backend> Simulation<B> {
    pub fn new(backend: B, width: u32, height: u32) -> Result<Self, SetupError> {
        Self::with_config(backend, width, height, SimConfig::default())
    }

    /// Allocates both render targets and compiles both programs.
    ///
    /// Any failure here is final; nothing is retried.
    pub fn with_config(
        mut backend: B,
        width: u32,
        height: u32,
        config: SimConfig,
    ) -> Result<Self, SetupError> {
        config.validate()?;
        let grid = Grid::new(width, height)?;

        let buffers = DoubleBuffer::create(&mut backend, grid)?;
        let advect_program = backend.compile_program(&ADVECT_PROGRAM)?;
        let relax_program = backend.compile_program(&RELAX_PROGRAM)?;

        log::info!(
            "simulation {}x{} ready ({} passes per step)",
            width,
            height,
            config.passes_per_step()
        );

        Ok(Self {
            backend,
            grid,
            config,
            buffers,
            advect_program,
            relax_program,
            snapshot: None,
            frame: 0,
        })
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Completed steps.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn foreground_handle(&self) -> TextureHandle {
        self.buffers.foreground().handle()
    }

    pub fn background_handle(&self) -> TextureHandle {
        self.buffers.background().handle()
    }

    fn check_grid(&self, other: Grid) -> Result<(), PreconditionViolation> {
        self.grid.ensure_matches(other)
    }

    /// Uploads a source field into a new texture owned by this simulation's backend.
    pub fn create_source(&mut self, field: &SourceField) -> Result<SourceTexture, FieldError> {
        self.check_grid(field.grid())?;
        let handle = self.backend.create_texture(self.grid, "Source Field")?;
        self.backend.write_texture(handle, field.texels())?;
        Ok(SourceTexture {
            handle,
            grid: self.grid,
        })
    }

    /// Rewrites a source texture between steps, e.g. to move an injector.
    pub fn update_source(
        &mut self,
        texture: &SourceTexture,
        field: &SourceField,
    ) -> Result<(), PreconditionViolation> {
        self.check_grid(texture.grid)?;
        self.check_grid(field.grid())?;
        self.backend.write_texture(texture.handle, field.texels())
    }

    /// Overwrites the current foreground field, e.g. with initial conditions.
    pub fn write_field(&mut self, texels: &[Texel]) -> Result<(), PreconditionViolation> {
        if texels.len() != self.grid.len() {
            return Err(PreconditionViolation::FieldLength {
                expected: self.grid.len(),
                actual: texels.len(),
            });
        }
        self.backend
            .write_texture(self.buffers.foreground().handle(), texels)
    }

    /// Advances the field by `dt` seconds against `source`.
    ///
    /// Always issues the full pass sequence: swap, advect, then for each
    /// relaxation iteration swap and relax. Returns the new foreground.
    /// `source` must not be rewritten while this runs.
    pub fn step(&mut self, source: &SourceTexture, dt: f32) -> Result<TextureHandle, FieldError> {
        if !(dt >= 0.0 && dt.is_finite()) {
            return Err(PreconditionViolation::InvalidTimeStep(dt).into());
        }
        self.check_grid(source.grid)?;

        self.buffers.swap();
        self.advect(source.handle, dt)?;

        for _ in 0..self.config.relax_iterations {
            self.buffers.swap();
            self.relax(source.handle)?;
        }

        self.frame += 1;
        Ok(self.buffers.foreground().handle())
    }

    fn advect(&mut self, source: TextureHandle, dt: f32) -> Result<(), PreconditionViolation> {
        let inputs = passes::advect_inputs(
            self.grid,
            self.buffers.background().handle(),
            source,
            dt,
            &self.config,
        );
        self.backend.draw_quad(
            &self.advect_program,
            self.buffers.foreground().handle(),
            &inputs,
        )
    }

    fn relax(&mut self, source: TextureHandle) -> Result<(), PreconditionViolation> {
        let inputs = passes::relax_inputs(
            self.grid,
            self.buffers.background().handle(),
            source,
            &self.config,
        );
        self.backend.draw_quad(
            &self.relax_program,
            self.buffers.foreground().handle(),
            &inputs,
        )
    }

    /// Copies the foreground into CPU memory for point queries.
    ///
    /// The field is undefined until the first step, so reading it earlier
    /// is `NoSnapshot`.
    pub fn read_back(&mut self) -> Result<&FieldSnapshot, FieldError> {
        if self.frame == 0 {
            return Err(PreconditionViolation::NoSnapshot.into());
        }
        let texels = self
            .backend
            .read_texture(self.buffers.foreground().handle())?;
        let snapshot = FieldSnapshot::new(self.grid, texels)?;
        Ok(self.snapshot.insert(snapshot))
    }

    pub fn snapshot(&self) -> Option<&FieldSnapshot> {
        self.snapshot.as_ref()
    }

    /// Velocity at normalized `(x, y)` from the last read-back.
    pub fn sample(&self, x: f32, y: f32) -> Result<Vec2, PreconditionViolation> {
        self.snapshot
            .as_ref()
            .map(|snapshot| snapshot.sample(x, y))
            .ok_or(PreconditionViolation::NoSnapshot)
    }
}
