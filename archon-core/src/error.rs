//! Error taxonomy for the simulation core, per the engine's error handling design.

use thiserror::Error;

/// Errors raised by simulation subsystems at runtime.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid province id {0}")]
    InvalidProvinceId(u16),

    #[error("invalid country id {0}")]
    InvalidCountryId(u16),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("command rejected: {0}")]
    CommandRejected(String),

    /// A command passed validation but failed during execution. Unlike
    /// `CommandRejected` (an expected, non-fatal outcome of validation),
    /// this means state was already assumed consistent and turned out not
    /// to be — fatal, per §4.5: the caller should attempt an emergency save
    /// before propagating further.
    #[error("command execution failed (fatal): {0}")]
    ExecutionFailed(String),

    #[error("determinism mismatch: expected checksum {expected:#010x}, got {actual:#010x}")]
    DeterminismMismatch { expected: u32, actual: u32 },

    #[error("save format version {found} is incompatible with engine version {current}")]
    VersionIncompatible { found: u32, current: u32 },

    #[error("malformed save data: {0}")]
    SaveCorrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;
