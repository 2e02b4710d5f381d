//! The seam between the solver and whatever executes its passes
//!
//! A backend owns textures, compiles vertex/fragment program pairs and draws a
//! full-screen quad into one destination texture at a time. The solver only
//! ever talks to it through [`Backend`].

use std::collections::BTreeMap;

use crate::error::{FieldError, PreconditionViolation, SetupError};
use crate::grid::{Grid, Texel};

/// Opaque reference to a texture owned by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(u32);

impl TextureHandle {
    pub fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn id(&self) -> u32 {
        self.0
    }

    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// The fragment stage a program runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kernel {
    Advect,
    Relax,
}

/// Text sources for one program.
#[derive(Debug, Clone, Copy)]
pub struct ProgramSource {
    pub label: &'static str,
    pub kernel: Kernel,
    pub vertex: &'static str,
    pub fragment: &'static str,
}

/// Named inputs bound atomically before a draw.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassInputs {
    textures: BTreeMap<&'static str, TextureHandle>,
    scalars: BTreeMap<&'static str, f32>,
}

impl PassInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn texture(mut self, name: &'static str, handle: TextureHandle) -> Self {
        self.textures.insert(name, handle);
        self
    }

    pub fn scalar(mut self, name: &'static str, value: f32) -> Self {
        self.scalars.insert(name, value);
        self
    }

    pub fn get_texture(&self, name: &'static str) -> Result<TextureHandle, PreconditionViolation> {
        self.textures
            .get(name)
            .copied()
            .ok_or(PreconditionViolation::MissingInput(name))
    }

    /// Unbound scalars read as zero, matching an unset uniform.
    pub fn get_scalar(&self, name: &'static str) -> f32 {
        self.scalars.get(name).copied().unwrap_or(0.0)
    }

    pub fn textures(&self) -> impl Iterator<Item = (&'static str, TextureHandle)> + '_ {
        self.textures.iter().map(|(name, handle)| (*name, *handle))
    }
}

pub trait Backend {
    type Program;

    /// Allocates a filtered, clamp-to-edge float texture that can be drawn into.
    fn create_render_target(&mut self, grid: Grid, label: &str)
    -> Result<TextureHandle, SetupError>;

    /// Allocates a sampled-only float texture, used for source fields.
    fn create_texture(&mut self, grid: Grid, label: &str) -> Result<TextureHandle, SetupError>;

    /// Replaces the full contents of a texture. `texels` must cover its grid.
    fn write_texture(
        &mut self,
        texture: TextureHandle,
        texels: &[Texel],
    ) -> Result<(), PreconditionViolation>;

    fn compile_program(&mut self, source: &ProgramSource) -> Result<Self::Program, SetupError>;

    /// Renders the full-screen quad with `program` into `destination`.
    fn draw_quad(
        &mut self,
        program: &Self::Program,
        destination: TextureHandle,
        inputs: &PassInputs,
    ) -> Result<(), PreconditionViolation>;

    /// Copies a texture back into CPU memory, row 0 first.
    fn read_texture(&mut self, texture: TextureHandle) -> Result<Vec<Texel>, FieldError>;
}
