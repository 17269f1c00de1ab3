#![allow(dead_code)]

use thiserror::Error;

/// Conditions that make a correct render impossible.
///
/// Numerical breakdowns (degenerate primitives, zero-length normals) are
/// deliberately absent: those recover locally with flags and canonical
/// fallbacks. Shadow rays that hit an unhandled numerical condition report
/// full transparency instead of erroring.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("density file is malformed: {0}")]
    InvalidDensityFile(String),

    #[error("density file i/o: {0}")]
    DensityFileIo(#[from] std::io::Error),

    #[error("user function failed to compile: {0}")]
    FunctionCompile(#[from] fn_vm::Error),

    #[error("unsupported combination: {0}")]
    UnsupportedFlagCombination(String),

    #[error("precompute depth {0} out of range (1..=20)")]
    PrecomputeDepth(u32),

    #[error("out of memory for {0}")]
    ResourceExhaustion(&'static str),

    #[error("render cancelled")]
    Cancelled,
}

pub type RenderResult<T> = Result<T, RenderError>;
