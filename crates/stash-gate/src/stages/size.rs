use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{GatePhase, GateStage, UploadCandidate};

/// Fails once `received` is strictly greater than `max`.
pub fn check_size(received: u64, max: u64) -> Result<(), GateError> {
    if received > max {
        return Err(GateError::SizeExceeded { max });
    }
    Ok(())
}

/// Running size limit, evaluated after every chunk.
pub struct SizeStage;

impl GateStage for SizeStage {
    fn name(&self) -> &str {
        "size"
    }

    fn phase(&self) -> GatePhase {
        GatePhase::Transfer
    }

    fn evaluate(
        &self,
        candidate: &UploadCandidate<'_>,
        config: &GateConfig,
    ) -> Result<(), GateError> {
        check_size(candidate.received, config.max_artifact_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundary() {
        assert!(check_size(0, 1024).is_ok());
        assert!(check_size(1024, 1024).is_ok());
        assert_eq!(check_size(1025, 1024), Err(GateError::SizeExceeded { max: 1024 }));
    }

    #[test]
    fn stage_uses_configured_max() {
        let config = GateConfig::new(10, [".png"]);
        assert!(SizeStage
            .evaluate(&UploadCandidate::new("a.png", 10), &config)
            .is_ok());
        assert!(SizeStage
            .evaluate(&UploadCandidate::new("a.png", 11), &config)
            .is_err());
    }
}
