use thiserror::Error;

/// Conditions a caller is expected to render rather than treat as a crash.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EkgError {
    /// The export contained no usable sample lines.
    #[error("no samples found; check that the file is an EKG export")]
    NoData,
    #[error("need at least {needed} sample(s), got {actual}")]
    InsufficientData { needed: usize, actual: usize },
}
