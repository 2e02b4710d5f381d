use fluxgrid::render::{direction_color, intensity_color};
use fluxgrid::{ColorMode, FieldMetrics, FieldRenderer, FieldSnapshot, Grid, ImageExporter, MetricsHistory};
use glam::{Vec2, Vec3};

fn snapshot_from(grid: Grid, f: impl Fn(u32, u32) -> Vec2) -> FieldSnapshot {
    let mut texels = grid.zeroed();
    for row in 0..grid.height() {
        for col in 0..grid.width() {
            let v = f(col, row);
            texels[grid.index(col, row)] = [v.x, v.y, 0.0, 1.0];
        }
    }
    FieldSnapshot::new(grid, texels).unwrap()
}

#[test]
fn test_uniform_field_metrics() {
    let grid = Grid::new(6, 6).unwrap();
    let snapshot = snapshot_from(grid, |_, _| Vec2::new(3.0, 4.0));
    let metrics = FieldMetrics::analyze(&snapshot, 7);

    assert_eq!(metrics.frame, 7);
    assert!((metrics.max_speed - 5.0).abs() < 1e-6);
    assert!((metrics.avg_speed - 5.0).abs() < 1e-5);
    assert!((metrics.kinetic_energy - 36.0 * 12.5).abs() < 1e-3);
    assert_eq!(metrics.divergence, 0.0);
    assert_eq!(metrics.vorticity, 0.0);
}

#[test]
fn test_expanding_field_has_divergence_and_no_curl() {
    let grid = Grid::new(8, 8).unwrap();
    let snapshot = snapshot_from(grid, |col, row| Vec2::new(col as f32, row as f32));
    let metrics = FieldMetrics::analyze(&snapshot, 0);

    assert!((metrics.divergence - 2.0).abs() < 1e-6);
    assert_eq!(metrics.vorticity, 0.0);
}

#[test]
fn test_rotating_field_has_curl_and_no_divergence() {
    let grid = Grid::new(8, 8).unwrap();
    let snapshot = snapshot_from(grid, |col, row| Vec2::new(-(row as f32), col as f32));
    let metrics = FieldMetrics::analyze(&snapshot, 0);

    assert_eq!(metrics.divergence, 0.0);
    assert!((metrics.vorticity - 2.0).abs() < 1e-6);
}

#[test]
fn test_history_keeps_every_frame() {
    let grid = Grid::new(4, 4).unwrap();
    let still = snapshot_from(grid, |_, _| Vec2::ZERO);
    let moving = snapshot_from(grid, |_, _| Vec2::X);

    let mut history = MetricsHistory::new();
    history.record_frame(&still, 0);
    history.record_frame(&moving, 1);
    history.log_trends();

    assert_eq!(history.metrics_history.len(), 2);
    assert_eq!(history.first().unwrap().max_speed, 0.0);
    assert_eq!(history.last().unwrap().max_speed, 1.0);
}

#[test]
fn test_intensity_ramp() {
    assert_eq!(intensity_color(Vec2::ZERO), Vec3::new(0.05, 0.1, 0.15));
    let fast = intensity_color(Vec2::new(0.0, 1.5));
    assert!((fast.y - 0.6).abs() < 1e-6);
    assert!((fast.z - 1.65).abs() < 1e-6);
}

#[test]
fn test_direction_colors() {
    assert_eq!(direction_color(Vec2::ZERO), Vec3::ZERO);
    let east = direction_color(Vec2::X);
    assert!((east - Vec3::new(1.0, 0.0, 0.0)).length() < 1e-5);
    let north = direction_color(Vec2::new(0.0, 0.5));
    assert!(north.x < north.y, "quarter turn should be green-ish, got {north:?}");
}

#[test]
fn test_renderer_scales_to_image_size() {
    let grid = Grid::new(4, 2).unwrap();
    let snapshot = snapshot_from(grid, |col, _| if col < 2 { Vec2::ZERO } else { Vec2::X });
    let renderer = FieldRenderer::new(8, 4).with_mode(ColorMode::Intensity);
    let img = renderer.render(&snapshot);

    assert_eq!(img.dimensions(), (8, 4));
    // Still cells show the base colour, moving cells are bright blue
    assert_eq!(img.get_pixel(0, 0).0, [13, 26, 38]);
    assert_eq!(img.get_pixel(7, 3).0[2], 255);
}

#[test]
fn test_export_frame_writes_png() {
    let dir = std::env::temp_dir().join(format!("fluxgrid_export_{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();

    let grid = Grid::new(4, 4).unwrap();
    let snapshot = snapshot_from(grid, |_, _| Vec2::Y);
    let exporter = ImageExporter::new(16, 16).with_mode(ColorMode::Direction);
    let path = exporter.export_frame(&snapshot, &dir, "velocity", 3).unwrap();

    assert!(path.ends_with("velocity_frame_0003.png"));
    let img = image::open(&path).unwrap();
    assert_eq!((img.width(), img.height()), (16, 16));

    std::fs::remove_dir_all(&dir).unwrap();
}
