//! Software backend: runs every draw as a per-texel loop over the kernels

use glam::Vec2;
use rayon::prelude::*;

use crate::backend::{Backend, Kernel, PassInputs, ProgramSource, TextureHandle};
use crate::error::{FieldError, PreconditionViolation, SetupError};
use crate::grid::{Grid, Texel};
use crate::kernels::{AdvectParams, TexelView, advect_texel, relax_texel};
use crate::passes;

#[derive(Debug, Clone)]
struct CpuTexture {
    label: String,
    grid: Grid,
    texels: Vec<Texel>,
    render_target: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuProgram {
    label: &'static str,
    kernel: Kernel,
}

impl CpuProgram {
    pub fn kernel(&self) -> Kernel {
        self.kernel
    }

    pub fn label(&self) -> &'static str {
        self.label
    }
}

/// Reference backend that rasterizes the full-screen quad on the CPU.
///
/// Rows are shaded in parallel; every texel depends only on the input
/// textures, so results do not depend on scheduling.
#[derive(Debug, Default)]
pub struct CpuBackend {
    textures: Vec<CpuTexture>,
    draws: u64,
}

impl CpuBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draw calls issued since creation.
    pub fn draw_count(&self) -> u64 {
        self.draws
    }

    pub fn texels(&self, texture: TextureHandle) -> Option<&[Texel]> {
        self.textures.get(texture.index()).map(|t| t.texels.as_slice())
    }

    fn allocate(&mut self, grid: Grid, label: &str, render_target: bool) -> TextureHandle {
        let handle = TextureHandle::new(self.textures.len() as u32);
        self.textures.push(CpuTexture {
            label: label.to_string(),
            grid,
            texels: grid.zeroed(),
            render_target,
        });
        log::debug!("cpu texture {} `{label}` {}x{}", handle.id(), grid.width(), grid.height());
        handle
    }

    fn get(&self, texture: TextureHandle) -> Result<&CpuTexture, PreconditionViolation> {
        self.textures
            .get(texture.index())
            .ok_or(PreconditionViolation::UnknownTexture(texture.id()))
    }
}

impl Backend for CpuBackend {
    type Program = CpuProgram;

    fn create_render_target(&mut self, grid: Grid, label: &str) -> Result<TextureHandle, SetupError> {
        Ok(self.allocate(grid, label, true))
    }

    fn create_texture(&mut self, grid: Grid, label: &str) -> Result<TextureHandle, SetupError> {
        Ok(self.allocate(grid, label, false))
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        texels: &[Texel],
    ) -> Result<(), PreconditionViolation> {
        let target = self
            .textures
            .get_mut(texture.index())
            .ok_or(PreconditionViolation::UnknownTexture(texture.id()))?;
        if texels.len() != target.texels.len() {
            return Err(PreconditionViolation::FieldLength {
                expected: target.texels.len(),
                actual: texels.len(),
            });
        }
        target.texels.copy_from_slice(texels);
        Ok(())
    }

    fn compile_program(&mut self, source: &ProgramSource) -> Result<CpuProgram, SetupError> {
        // Nothing to compile, but an empty stage would fail on a real device too.
        if source.vertex.trim().is_empty() || source.fragment.trim().is_empty() {
            return Err(SetupError::ProgramCompile {
                label: source.label.to_string(),
                message: "empty shader stage".to_string(),
            });
        }
        Ok(CpuProgram {
            label: source.label,
            kernel: source.kernel,
        })
    }

    fn draw_quad(
        &mut self,
        program: &CpuProgram,
        destination: TextureHandle,
        inputs: &PassInputs,
    ) -> Result<(), PreconditionViolation> {
        let field_handle = inputs.get_texture(passes::FIELD)?;
        let source_handle = inputs.get_texture(passes::SOURCE)?;
        for (_, handle) in inputs.textures() {
            if handle == destination {
                return Err(PreconditionViolation::AliasedTarget(handle.id()));
            }
        }

        let dest = self.get(destination)?;
        if !dest.render_target {
            return Err(PreconditionViolation::UnknownTexture(destination.id()));
        }
        let grid = dest.grid;
        let field = self.get(field_handle)?;
        let source = self.get(source_handle)?;
        grid.ensure_matches(field.grid)?;
        grid.ensure_matches(source.grid)?;

        let field = TexelView::new(field.grid, &field.texels);
        let source = TexelView::new(source.grid, &source.texels);
        let width = grid.width() as usize;
        let mut out = grid.zeroed();

        let texel_size = Vec2::new(inputs.get_scalar(passes::DX), inputs.get_scalar(passes::DY));

        log::trace!("cpu draw `{}` -> {}", program.label, destination.id());
        match program.kernel {
            Kernel::Advect => {
                let params = AdvectParams {
                    texel: texel_size,
                    dt: inputs.get_scalar(passes::DT),
                    decay: inputs.get_scalar(passes::DECAY),
                    rate: inputs.get_scalar(passes::RATE),
                };
                out.par_chunks_mut(width).enumerate().for_each(|(row, line)| {
                    for (col, shaded) in line.iter_mut().enumerate() {
                        let uv = grid.cell_center(col as u32, row as u32);
                        *shaded = advect_texel(&field, &source, uv, params);
                    }
                });
            }
            Kernel::Relax => {
                let weight = inputs.get_scalar(passes::WEIGHT);
                out.par_chunks_mut(width).enumerate().for_each(|(row, line)| {
                    for (col, shaded) in line.iter_mut().enumerate() {
                        let uv = grid.cell_center(col as u32, row as u32);
                        *shaded = relax_texel(&field, &source, uv, texel_size, weight);
                    }
                });
            }
        }

        self.textures[destination.index()].texels = out;
        self.draws += 1;
        Ok(())
    }

    fn read_texture(&mut self, texture: TextureHandle) -> Result<Vec<Texel>, FieldError> {
        let texture = self.get(texture)?;
        log::debug!("cpu read-back of `{}`", texture.label);
        Ok(texture.texels.clone())
    }
}
