//! Domain errors.
//!
//! Library functions return `anyhow::Result`; these variants are the typed
//! failures worth matching on (`err.downcast_ref::<Error>()`).
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("channel '{0}' not found")]
    ChannelNotFound(String),

    #[error("annotation table has no '{0}' column")]
    MissingColumn(String),

    #[error("recording has no samples")]
    EmptyRecording,

    #[error("invalid window: tmin {tmin} s must not exceed tmax {tmax} s")]
    InvalidWindow { tmin: f64, tmax: f64 },

    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("{0} used before fit")]
    NotFitted(&'static str),

    #[error("degenerate input: {0}")]
    Degenerate(String),
}
