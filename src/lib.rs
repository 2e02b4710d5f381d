//! Double-buffered 2D velocity field solver: semi-Lagrangian advection and
//! divergence relaxation run as full-screen quad passes

pub mod analysis;
pub mod backend;
pub mod config;
pub mod cpu_backend;
pub mod double_buffer;
pub mod error;
pub mod export;
pub mod grid;
pub mod kernels;
pub mod passes;
pub mod render;
pub mod simulation;
pub mod snapshot;
pub mod source;

#[cfg(feature = "gpu")]
pub mod gpu_backend;

// Feature-based backend selection
#[cfg(feature = "cpu")]
pub type DefaultBackend = cpu_backend::CpuBackend;

#[cfg(all(feature = "gpu", not(feature = "cpu")))]
pub type DefaultBackend = gpu_backend::WgpuBackend;

pub use analysis::{FieldMetrics, MetricsHistory};
pub use backend::{Backend, Kernel, PassInputs, ProgramSource, TextureHandle};
pub use config::SimConfig;
pub use cpu_backend::CpuBackend;
pub use double_buffer::{DoubleBuffer, RenderTarget};
pub use error::{FieldError, PreconditionViolation, SetupError};
pub use export::ImageExporter;
pub use grid::{Grid, Texel};
pub use render::{ColorMode, FieldRenderer};
pub use simulation::Simulation;
pub use snapshot::{FieldData, FieldSnapshot};
pub use source::{SourceField, SourceTexture};

#[cfg(feature = "gpu")]
pub use gpu_backend::WgpuBackend;
