use crate::snapshot::FieldData;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldMetrics {
    pub max_speed: f32,
    pub avg_speed: f32,
    pub kinetic_energy: f32,
    /// Mean absolute central-difference divergence over interior cells.
    pub divergence: f32,
    /// Mean absolute central-difference curl over interior cells.
    pub vorticity: f32,
    pub frame: u64,
}

impl FieldMetrics {
    pub fn analyze(field: &impl FieldData, frame: u64) -> Self {
        let width = field.width();
        let height = field.height();
        let size = (width * height).max(1) as f32;

        let mut max_speed: f32 = 0.0;
        let mut speed_sum: f32 = 0.0;
        let mut kinetic_energy: f32 = 0.0;

        for row in 0..height {
            for col in 0..width {
                let v = field.velocity_at(col, row);
                let speed = v.length();
                max_speed = max_speed.max(speed);
                speed_sum += speed;
                kinetic_energy += 0.5 * v.length_squared();
            }
        }

        let mut total_divergence = 0.0;
        let mut total_vorticity = 0.0;
        let mut interior = 0usize;

        for row in 1..height.saturating_sub(1) {
            for col in 1..width.saturating_sub(1) {
                let left = field.velocity_at(col - 1, row);
                let right = field.velocity_at(col + 1, row);
                let up = field.velocity_at(col, row - 1);
                let down = field.velocity_at(col, row + 1);

                // ∇·v
                let divergence = (right.x - left.x + down.y - up.y) / 2.0;
                total_divergence += divergence.abs();

                // ∇×v
                let vorticity = (right.y - left.y - (down.x - up.x)) / 2.0;
                total_vorticity += vorticity.abs();
                interior += 1;
            }
        }

        let interior = interior.max(1) as f32;

        Self {
            max_speed,
            avg_speed: speed_sum / size,
            kinetic_energy,
            divergence: total_divergence / interior,
            vorticity: total_vorticity / interior,
            frame,
        }
    }

    pub fn log_summary(&self) {
        log::info!(
            "frame {}: max speed {:.4}, avg speed {:.4}, energy {:.4}, |div| {:.6}, |curl| {:.6}",
            self.frame,
            self.max_speed,
            self.avg_speed,
            self.kinetic_energy,
            self.divergence,
            self.vorticity
        );
    }
}

#[derive(Debug, Default)]
pub struct MetricsHistory {
    pub metrics_history: Vec<FieldMetrics>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, field: &impl FieldData, frame: u64) -> &FieldMetrics {
        let metrics = FieldMetrics::analyze(field, frame);
        self.metrics_history.push(metrics);
        &self.metrics_history[self.metrics_history.len() - 1]
    }

    pub fn first(&self) -> Option<&FieldMetrics> {
        self.metrics_history.first()
    }

    pub fn last(&self) -> Option<&FieldMetrics> {
        self.metrics_history.last()
    }

    pub fn log_trends(&self) {
        let (Some(first), Some(last)) = (self.first(), self.last()) else {
            return;
        };
        if self.metrics_history.len() < 2 {
            return;
        }

        log::info!(
            "kinetic energy: {:.6} -> {:.6} ({:+.3}%)",
            first.kinetic_energy,
            last.kinetic_energy,
            (last.kinetic_energy - first.kinetic_energy) / first.kinetic_energy.max(0.001) * 100.0
        );
        log::info!(
            "divergence: {:.6} -> {:.6} ({:+.3}%)",
            first.divergence,
            last.divergence,
            (last.divergence - first.divergence) / first.divergence.max(0.001) * 100.0
        );
        log::info!("max speed: {:.6} -> {:.6}", first.max_speed, last.max_speed);
    }
}
