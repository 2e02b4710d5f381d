use fluxgrid::passes::{self, ADVECT_PROGRAM, RELAX_PROGRAM};
use fluxgrid::{Backend, CpuBackend, Grid, Kernel, PreconditionViolation, ProgramSource, SetupError, SimConfig};

#[test]
fn test_compile_rejects_empty_stage() {
    let mut backend = CpuBackend::new();
    let broken = ProgramSource {
        label: "broken",
        kernel: Kernel::Relax,
        vertex: passes::QUAD_VERTEX_SOURCE,
        fragment: "  ",
    };
    assert!(matches!(
        backend.compile_program(&broken),
        Err(SetupError::ProgramCompile { .. })
    ));

    let program = backend.compile_program(&ADVECT_PROGRAM).unwrap();
    assert_eq!(program.kernel(), Kernel::Advect);
    assert_eq!(program.label(), "advect");
}

#[test]
fn test_draw_refuses_to_sample_its_destination() {
    let mut backend = CpuBackend::new();
    let grid = Grid::new(4, 4).unwrap();
    let target = backend.create_render_target(grid, "target").unwrap();
    let source = backend.create_texture(grid, "source").unwrap();
    let program = backend.compile_program(&RELAX_PROGRAM).unwrap();

    let inputs = passes::relax_inputs(grid, target, source, &SimConfig::default());
    assert_eq!(
        backend.draw_quad(&program, target, &inputs),
        Err(PreconditionViolation::AliasedTarget(target.id()))
    );
    assert_eq!(backend.draw_count(), 0);
}

#[test]
fn test_draw_requires_a_render_target() {
    let mut backend = CpuBackend::new();
    let grid = Grid::new(4, 4).unwrap();
    let field = backend.create_render_target(grid, "field").unwrap();
    let source = backend.create_texture(grid, "source").unwrap();
    let plain = backend.create_texture(grid, "plain").unwrap();
    let program = backend.compile_program(&RELAX_PROGRAM).unwrap();

    let inputs = passes::relax_inputs(grid, field, source, &SimConfig::default());
    assert_eq!(
        backend.draw_quad(&program, plain, &inputs),
        Err(PreconditionViolation::UnknownTexture(plain.id()))
    );
}

#[test]
fn test_draw_reports_missing_inputs() {
    let mut backend = CpuBackend::new();
    let grid = Grid::new(4, 4).unwrap();
    let target = backend.create_render_target(grid, "target").unwrap();
    let program = backend.compile_program(&RELAX_PROGRAM).unwrap();

    let inputs = fluxgrid::PassInputs::new().texture(passes::FIELD, target);
    assert_eq!(
        backend.draw_quad(&program, target, &inputs),
        Err(PreconditionViolation::MissingInput(passes::SOURCE))
    );
}

#[test]
fn test_draw_rejects_inputs_on_another_grid() {
    let mut backend = CpuBackend::new();
    let grid = Grid::new(4, 4).unwrap();
    let target = backend.create_render_target(grid, "target").unwrap();
    let field = backend.create_render_target(Grid::new(6, 3).unwrap(), "field").unwrap();
    let source = backend.create_texture(grid, "source").unwrap();
    let program = backend.compile_program(&RELAX_PROGRAM).unwrap();

    let inputs = passes::relax_inputs(grid, field, source, &SimConfig::default());
    assert_eq!(
        backend.draw_quad(&program, target, &inputs),
        Err(PreconditionViolation::SourceDimensions {
            expected_width: 4,
            expected_height: 4,
            actual_width: 6,
            actual_height: 3,
        })
    );
    assert_eq!(backend.draw_count(), 0);
}

#[test]
fn test_write_and_read_round_trip_row_order() {
    let mut backend = CpuBackend::new();
    let grid = Grid::new(3, 2).unwrap();
    let texture = backend.create_render_target(grid, "field").unwrap();
    let texels: Vec<[f32; 4]> = (0..6).map(|i| [i as f32, 0.0, 0.0, 1.0]).collect();

    backend.write_texture(texture, &texels).unwrap();
    assert_eq!(backend.read_texture(texture).unwrap(), texels);
    assert_eq!(
        backend.write_texture(texture, &texels[..5]),
        Err(PreconditionViolation::FieldLength {
            expected: 6,
            actual: 5,
        })
    );
}
