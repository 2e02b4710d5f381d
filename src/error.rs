//! Error types for simulation setup and per-step contract violations

use thiserror::Error;

/// Fatal failures raised once while building a simulation.
///
/// None of these are retried: each one means the device lacks a capability,
/// a shader is malformed, or the caller asked for an impossible grid.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    InvalidGrid { width: u32, height: u32 },

    #[error("no suitable GPU adapter found")]
    NoAdapter,

    #[error("failed to acquire GPU device: {0}")]
    DeviceRequest(String),

    #[error("render target `{label}` is incomplete: {reason}")]
    IncompleteTarget { label: String, reason: String },

    #[error("failed to compile program `{label}`: {message}")]
    ProgramCompile { label: String, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to load configuration: {0}")]
    Config(String),
}

impl From<std::io::Error> for SetupError {
    fn from(err: std::io::Error) -> Self {
        SetupError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for SetupError {
    fn from(err: serde_json::Error) -> Self {
        SetupError::Config(err.to_string())
    }
}

/// Programming-contract violations reported back to the caller.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PreconditionViolation {
    #[error("source field is {actual_width}x{actual_height}, simulation grid is {expected_width}x{expected_height}")]
    SourceDimensions {
        expected_width: u32,
        expected_height: u32,
        actual_width: u32,
        actual_height: u32,
    },

    #[error("expected {expected} texels, got {actual}")]
    FieldLength { expected: usize, actual: usize },

    #[error("no field snapshot available; step and read back first")]
    NoSnapshot,

    #[error("time step must be finite and non-negative, got {0}")]
    InvalidTimeStep(f32),

    #[error("pass input `{0}` was not bound")]
    MissingInput(&'static str),

    #[error("pass samples texture {0} while drawing into it")]
    AliasedTarget(u32),

    #[error("unknown texture {0}")]
    UnknownTexture(u32),

    #[error("cell ({col}, {row}) lies outside the {width}x{height} grid")]
    CellOutOfRange {
        col: u32,
        row: u32,
        width: u32,
        height: u32,
    },
}

/// Umbrella error for operations that can hit either kind, or a failed read-back.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Precondition(#[from] PreconditionViolation),

    #[error("field read-back failed: {0}")]
    Readback(String),
}
