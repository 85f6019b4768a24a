use crate::config::GateConfig;
use crate::error::GateError;

/// When a stage runs relative to the byte transfer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GatePhase {
    /// Once, after the name is known and before any byte is accepted.
    Admission,
    /// After every received chunk.
    Transfer,
}

/// What a stage gets to look at.
#[derive(Clone, Copy, Debug)]
pub struct UploadCandidate<'a> {
    /// Sanitized artifact name.
    pub name: &'a str,
    /// Bytes received so far.
    pub received: u64,
}

impl<'a> UploadCandidate<'a> {
    pub fn new(name: &'a str, received: u64) -> Self {
        Self { name, received }
    }
}

/// A single check in the upload gate.
///
/// Stages are pure: they look at the candidate and the limits and either
/// pass or return the reason for refusal. The trait is object-safe so
/// stages can live in a `Vec<Box<dyn GateStage>>`.
pub trait GateStage: Send + Sync {
    /// Short name used in logs ("name", "extension", ...).
    fn name(&self) -> &str;

    /// Which phase this stage belongs to.
    fn phase(&self) -> GatePhase;

    /// Evaluate the candidate against the configured limits.
    fn evaluate(&self, candidate: &UploadCandidate<'_>, config: &GateConfig)
        -> Result<(), GateError>;
}
