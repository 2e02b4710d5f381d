use glam::{Vec2, Vec3};
use image::{ImageBuffer, Rgb, RgbImage};

use crate::snapshot::FieldData;

const BASE_COLOR: Vec3 = Vec3::new(0.05, 0.1, 0.15);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    /// Dark base, blue from speed, green once speed passes 1.
    #[default]
    Intensity,
    /// Hue from direction, value from speed.
    Direction,
}

pub struct FieldRenderer {
    width: u32,
    height: u32,
    mode: ColorMode,
}

impl FieldRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            mode: ColorMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn render(&self, field: &impl FieldData) -> RgbImage {
        let mut img = ImageBuffer::new(self.width, self.height);

        let scale_x = field.width() as f32 / self.width as f32;
        let scale_y = field.height() as f32 / self.height as f32;

        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let col = (x as f32 * scale_x) as usize;
            let row = (y as f32 * scale_y) as usize;

            if col < field.width() && row < field.height() {
                let v = field.velocity_at(col, row);
                let color = match self.mode {
                    ColorMode::Intensity => intensity_color(v),
                    ColorMode::Direction => direction_color(v),
                };
                *pixel = to_rgb(color);
            } else {
                *pixel = Rgb([0, 0, 0]);
            }
        }

        img
    }
}

pub fn intensity_color(v: Vec2) -> Vec3 {
    let speed = v.length();
    BASE_COLOR + Vec3::new(0.0, (speed - 1.0).clamp(0.0, 1.0), speed)
}

pub fn direction_color(v: Vec2) -> Vec3 {
    let speed = v.length();
    if speed == 0.0 {
        return Vec3::ZERO;
    }
    let hue = (v.y.atan2(v.x) / std::f32::consts::TAU).rem_euclid(1.0);
    hsv_to_rgb(hue, 1.0, speed.min(1.0))
}

fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Vec3 {
    let sector = h * 6.0;
    let i = sector.floor();
    let f = sector - i;
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));
    match i as i32 % 6 {
        0 => Vec3::new(v, t, p),
        1 => Vec3::new(q, v, p),
        2 => Vec3::new(p, v, t),
        3 => Vec3::new(p, q, v),
        4 => Vec3::new(t, p, v),
        _ => Vec3::new(v, p, q),
    }
}

fn to_rgb(color: Vec3) -> Rgb<u8> {
    let c = (color.clamp(Vec3::ZERO, Vec3::ONE) * 255.0).round();
    Rgb([c.x as u8, c.y as u8, c.z as u8])
}
