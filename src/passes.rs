//! The two solver programs and the inputs each draw binds

use crate::backend::{Kernel, PassInputs, ProgramSource, TextureHandle};
use crate::config::SimConfig;
use crate::grid::Grid;

pub const QUAD_VERTEX_SOURCE: &str = include_str!("shaders/quad.wgsl");

pub const ADVECT_PROGRAM: ProgramSource = ProgramSource {
    label: "advect",
    kernel: Kernel::Advect,
    vertex: QUAD_VERTEX_SOURCE,
    fragment: include_str!("shaders/advect.wgsl"),
};

pub const RELAX_PROGRAM: ProgramSource = ProgramSource {
    label: "relax",
    kernel: Kernel::Relax,
    vertex: QUAD_VERTEX_SOURCE,
    fragment: include_str!("shaders/relax.wgsl"),
};

pub const FIELD: &str = "field";
pub const SOURCE: &str = "source";

pub const DX: &str = "dx";
pub const DY: &str = "dy";
pub const DT: &str = "dt";
pub const DECAY: &str = "decay";
pub const RATE: &str = "rate";
pub const WEIGHT: &str = "weight";

fn common(grid: Grid, field: TextureHandle, source: TextureHandle) -> PassInputs {
    let texel = grid.texel_size();
    PassInputs::new()
        .texture(FIELD, field)
        .texture(SOURCE, source)
        .scalar(DX, texel.x)
        .scalar(DY, texel.y)
}

pub fn advect_inputs(
    grid: Grid,
    field: TextureHandle,
    source: TextureHandle,
    dt: f32,
    config: &SimConfig,
) -> PassInputs {
    common(grid, field, source)
        .scalar(DT, dt)
        .scalar(DECAY, config.decay)
        .scalar(RATE, config.rate)
}

pub fn relax_inputs(
    grid: Grid,
    field: TextureHandle,
    source: TextureHandle,
    config: &SimConfig,
) -> PassInputs {
    common(grid, field, source).scalar(WEIGHT, config.relax_weight)
}
