use std::path::{Path, PathBuf};

use crate::render::{ColorMode, FieldRenderer};
use crate::snapshot::FieldData;

pub struct ImageExporter {
    renderer: FieldRenderer,
}

impl ImageExporter {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            renderer: FieldRenderer::new(width, height),
        }
    }

    pub fn with_mode(mut self, mode: ColorMode) -> Self {
        self.renderer = self.renderer.with_mode(mode);
        self
    }

    pub fn export_png(
        &self,
        field: &impl FieldData,
        path: &Path,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let img = self.renderer.render(field);
        img.save(path)?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }

    /// Writes `<dir>/<prefix>_frame_<NNNN>.png` and returns its path.
    pub fn export_frame(
        &self,
        field: &impl FieldData,
        output_dir: &Path,
        prefix: &str,
        frame: u64,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = output_dir.join(format!("{prefix}_frame_{frame:04}.png"));
        self.export_png(field, &path)?;
        Ok(path)
    }
}
