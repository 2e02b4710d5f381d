use fluxgrid::{
    CpuBackend, FieldError, FieldMetrics, FieldSnapshot, PreconditionViolation, Simulation,
    SourceField,
};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DT: f32 = 1.0 / 60.0;

/// 10×6 grid with a 2×2 upward injector at columns 4-5, rows 2-3.
fn injector_sim() -> (Simulation<CpuBackend>, fluxgrid::SourceTexture) {
    let mut sim = Simulation::new(CpuBackend::new(), 10, 6).unwrap();
    let mut field = SourceField::new(10, 6).unwrap();
    assert_eq!(field.add_stream(4, 2, 2, 2, Vec2::new(0.0, 1.0)), 4);
    let source = sim.create_source(&field).unwrap();
    (sim, source)
}

#[test]
fn test_injector_is_exact_after_one_step() {
    let (mut sim, source) = injector_sim();
    sim.step(&source, DT).unwrap();
    sim.read_back().unwrap();

    // floor(10 * 0.45) = 4, floor(6 * 2.5/6) = 2
    assert_eq!(sim.sample(0.45, 2.5 / 6.0).unwrap(), Vec2::new(0.0, 1.0));

    let snapshot = sim.snapshot().unwrap();
    for (col, row) in [(4, 2), (5, 2), (4, 3), (5, 3)] {
        assert_eq!(snapshot.velocity(col, row), Some(Vec2::new(0.0, 1.0)));
    }
}

#[test]
fn test_far_field_stays_small_after_one_step() {
    let (mut sim, source) = injector_sim();
    sim.step(&source, DT).unwrap();
    sim.read_back().unwrap();

    // Twenty relaxation passes carry a little flow across the whole 10x6
    // grid, so the corner is small rather than exactly zero.
    let corner = sim.sample(0.0, 0.0).unwrap();
    assert!(corner.length() < 0.05, "corner velocity {corner:?}");
}

#[test]
fn test_injector_spreads_into_neighbors() {
    let (mut sim, source) = injector_sim();
    for _ in 0..5 {
        sim.step(&source, DT).unwrap();
    }
    let snapshot = sim.read_back().unwrap();

    let above = snapshot.velocity(4, 4).unwrap();
    assert!(above.length() > 1e-4, "relaxation should carry flow out of the injector");
    assert!(snapshot.max_speed() <= 1.5, "field should stay bounded, got {}", snapshot.max_speed());
}

#[test]
fn test_step_issues_one_advect_and_all_relax_passes() {
    let (mut sim, source) = injector_sim();
    assert_eq!(sim.backend().draw_count(), 0);

    sim.step(&source, DT).unwrap();
    assert_eq!(sim.backend().draw_count(), 21);
    assert_eq!(sim.frame(), 1);

    sim.step(&source, DT).unwrap();
    assert_eq!(sim.backend().draw_count(), 42);
    assert_eq!(sim.frame(), 2);
}

#[test]
fn test_step_returns_the_new_foreground() {
    let (mut sim, source) = injector_sim();
    let before = sim.foreground_handle();

    let after = sim.step(&source, DT).unwrap();
    assert_eq!(after, sim.foreground_handle());
    // 21 swaps per step leave the other target in front
    assert_ne!(after, before);
    assert_eq!(sim.background_handle(), before);
}

#[test]
fn test_zero_field_without_sources_stays_zero() {
    let mut sim = Simulation::new(CpuBackend::new(), 12, 9).unwrap();
    let source = sim.create_source(&SourceField::new(12, 9).unwrap()).unwrap();

    for _ in 0..3 {
        sim.step(&source, DT).unwrap();
    }
    let snapshot = sim.read_back().unwrap();
    assert!(snapshot.texels().iter().all(|t| t[0] == 0.0 && t[1] == 0.0));
}

#[test]
fn test_pinned_cells_match_source_after_every_step() {
    let mut sim = Simulation::new(CpuBackend::new(), 16, 12).unwrap();
    let mut field = SourceField::new(16, 12).unwrap().with_boundary_inflow(0.1);
    field.add_stream(3, 7, 2, 2, Vec2::new(2.0, 0.0));
    field.add_stream(10, 3, 2, 2, Vec2::new(-2.0, 0.0));
    let source = sim.create_source(&field).unwrap();

    for _ in 0..4 {
        sim.step(&source, DT).unwrap();
        let snapshot = sim.read_back().unwrap();
        for row in 0..12 {
            for col in 0..16 {
                if let Some(forced) = field.velocity(col, row) {
                    assert_eq!(snapshot.velocity(col, row), Some(forced), "cell ({col}, {row})");
                }
            }
        }
    }
}

#[test]
fn test_update_source_moves_the_injector() {
    let (mut sim, source) = injector_sim();
    sim.step(&source, DT).unwrap();

    let mut moved = SourceField::new(10, 6).unwrap();
    moved.set(1, 1, Vec2::new(1.0, 0.0)).unwrap();
    sim.update_source(&source, &moved).unwrap();
    sim.step(&source, DT).unwrap();

    let snapshot = sim.read_back().unwrap();
    assert_eq!(snapshot.velocity(1, 1), Some(Vec2::new(1.0, 0.0)));
    assert_ne!(snapshot.velocity(4, 2), Some(Vec2::new(0.0, 1.0)));
}

#[test]
fn test_steps_are_deterministic() {
    let run = || {
        let (mut sim, source) = injector_sim();
        for _ in 0..3 {
            sim.step(&source, DT).unwrap();
        }
        let snapshot = sim.read_back().unwrap().clone();
        snapshot
    };
    assert_eq!(run(), run());
}

#[test]
fn test_invalid_time_step_is_rejected_without_drawing() {
    let (mut sim, source) = injector_sim();

    for dt in [-DT, f32::NAN, f32::INFINITY] {
        let err = sim.step(&source, dt).unwrap_err();
        assert!(matches!(
            err,
            FieldError::Precondition(PreconditionViolation::InvalidTimeStep(_))
        ));
    }
    assert_eq!(sim.backend().draw_count(), 0);
    assert_eq!(sim.frame(), 0);
}

#[test]
fn test_source_with_wrong_dimensions_is_rejected() {
    let mut sim = Simulation::new(CpuBackend::new(), 10, 6).unwrap();
    let err = sim.create_source(&SourceField::new(8, 8).unwrap()).unwrap_err();
    assert!(matches!(
        err,
        FieldError::Precondition(PreconditionViolation::SourceDimensions {
            expected_width: 10,
            expected_height: 6,
            actual_width: 8,
            actual_height: 8,
        })
    ));

    // A source texture built for another grid
    let mut other = Simulation::new(CpuBackend::new(), 8, 8).unwrap();
    let foreign = other.create_source(&SourceField::new(8, 8).unwrap()).unwrap();
    let err = sim.step(&foreign, DT).unwrap_err();
    assert!(matches!(
        err,
        FieldError::Precondition(PreconditionViolation::SourceDimensions { .. })
    ));
    assert_eq!(sim.frame(), 0);
}

#[test]
fn test_write_field_checks_length() {
    let mut sim = Simulation::new(CpuBackend::new(), 4, 4).unwrap();
    assert_eq!(
        sim.write_field(&[[0.0; 4]; 3]),
        Err(PreconditionViolation::FieldLength {
            expected: 16,
            actual: 3,
        })
    );
}

#[test]
fn test_relaxation_reduces_divergence() {
    let (w, h) = (16u32, 16u32);
    let mut rng = StdRng::seed_from_u64(7);
    let initial: Vec<[f32; 4]> = (0..w * h)
        .map(|_| [rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0), 0.0, 1.0])
        .collect();

    let mut sim = Simulation::new(CpuBackend::new(), w, h).unwrap();
    let source = sim.create_source(&SourceField::new(w, h).unwrap()).unwrap();
    sim.write_field(&initial).unwrap();
    let before = FieldMetrics::analyze(&FieldSnapshot::new(sim.grid(), initial).unwrap(), 0);

    // dt = 0 makes advection the identity, leaving only relaxation
    sim.step(&source, 0.0).unwrap();
    let after = FieldMetrics::analyze(sim.read_back().unwrap(), 1);

    assert!(
        after.divergence < 0.75 * before.divergence,
        "divergence {} -> {}",
        before.divergence,
        after.divergence
    );
    assert!(
        after.kinetic_energy <= before.kinetic_energy,
        "energy {} -> {}",
        before.kinetic_energy,
        after.kinetic_energy
    );
}
