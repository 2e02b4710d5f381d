//! Per-texel reference of the advection and relaxation fragment programs
//!
//! These mirror `shaders/advect.wgsl` and `shaders/relax.wgsl` operation for
//! operation so the CPU backend and the GPU agree up to filtering precision.

use glam::{Vec2, Vec4, Vec4Swizzles};

use crate::grid::{Grid, Texel};

const FILTER_STEPS: f32 = 256.0;

/// Read-only view of a texture with linear filtering and clamp-to-edge addressing.
#[derive(Debug, Clone, Copy)]
pub struct TexelView<'a> {
    grid: Grid,
    texels: &'a [Texel],
}

impl<'a> TexelView<'a> {
    /// `texels` must hold exactly `grid.len()` entries.
    pub fn new(grid: Grid, texels: &'a [Texel]) -> Self {
        debug_assert_eq!(texels.len(), grid.len());
        Self { grid, texels }
    }

    pub fn grid(&self) -> Grid {
        self.grid
    }

    /// Texel at integer coordinates, clamped to the nearest edge.
    pub fn fetch(&self, col: i64, row: i64) -> Vec4 {
        let col = col.clamp(0, self.grid.width() as i64 - 1) as u32;
        let row = row.clamp(0, self.grid.height() as i64 - 1) as u32;
        Vec4::from_array(self.texels[self.grid.index(col, row)])
    }

    /// Bilinear sample at a normalized coordinate. Texel centres sit at `(i + 0.5) / W`.
    ///
    /// Interpolation fractions are quantized to 8 bits as in hardware linear
    /// filtering, so sampling at a texel centre returns that texel exactly.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let x = uv.x * self.grid.width() as f32 - 0.5;
        let y = uv.y * self.grid.height() as f32 - 0.5;
        let x0 = x.floor();
        let y0 = y.floor();
        let tx = ((x - x0) * FILTER_STEPS).round() / FILTER_STEPS;
        let ty = ((y - y0) * FILTER_STEPS).round() / FILTER_STEPS;
        let (c0, r0) = (x0 as i64, y0 as i64);

        let top = self.fetch(c0, r0) * (1.0 - tx) + self.fetch(c0 + 1, r0) * tx;
        let bottom = self.fetch(c0, r0 + 1) * (1.0 - tx) + self.fetch(c0 + 1, r0 + 1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvectParams {
    /// One cell in normalized coordinates, `(1/W, 1/H)`.
    pub texel: Vec2,
    pub dt: f32,
    pub decay: f32,
    pub rate: f32,
}

fn forced(source: &TexelView<'_>, uv: Vec2) -> Option<Texel> {
    let s = source.sample(uv);
    (s.w > 0.0).then_some([s.x, s.y, 0.0, 1.0])
}

/// Semi-Lagrangian advection of one cell.
///
/// Pinned cells copy the source velocity. Elsewhere the velocity relaxes
/// toward its decayed upstream neighbour one cell back along its own
/// direction, with blend factor `rate * dt` clamped to `[0, 1]`.
pub fn advect_texel(
    field: &TexelView<'_>,
    source: &TexelView<'_>,
    uv: Vec2,
    params: AdvectParams,
) -> Texel {
    if let Some(texel) = forced(source, uv) {
        return texel;
    }

    let v = field.sample(uv).xy();
    // Zero velocity has no direction; upstream is the cell itself.
    let n = v.try_normalize().unwrap_or(Vec2::ZERO);

    let upstream = field.sample(uv - n * params.texel).xy();
    let t = (params.rate * params.dt).clamp(0.0, 1.0);
    let out = v * (1.0 - t) + params.decay * upstream * t;
    [out.x, out.y, 0.0, 1.0]
}

/// One under-relaxed divergence correction of one cell.
pub fn relax_texel(
    field: &TexelView<'_>,
    source: &TexelView<'_>,
    uv: Vec2,
    texel: Vec2,
    weight: f32,
) -> Texel {
    if let Some(forced) = forced(source, uv) {
        return forced;
    }

    let at = |dc: f32, dr: f32| field.sample(uv + Vec2::new(dc, dr) * texel).xy();

    let v0 = at(-1.0, -1.0);
    let v1 = at(0.0, -1.0);
    let v2 = at(1.0, -1.0);
    let v3 = at(-1.0, 0.0);
    let v4 = at(0.0, 0.0);
    let v5 = at(1.0, 0.0);
    let v6 = at(-1.0, 1.0);
    let v7 = at(0.0, 1.0);
    let v8 = at(1.0, 1.0);

    let x = (v0.x + v0.y) - 2.0 * v1.x + (v2.x - v2.y) + 2.0 * v3.x - 4.0 * v4.x + 2.0 * v5.x
        + (v6.x - v6.y)
        - 2.0 * v7.x
        + (v8.x + v8.y);

    let y = (v0.x + v0.y) + 2.0 * v1.y + (v2.y - v2.x) - 2.0 * v3.y - 4.0 * v4.y - 2.0 * v5.y
        + (v6.y - v6.x)
        + 2.0 * v7.y
        + (v8.x + v8.y);

    let out = v4 + weight * Vec2::new(x, y);
    [out.x, out.y, 0.0, 1.0]
}
