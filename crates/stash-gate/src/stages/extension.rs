use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{GatePhase, GateStage, UploadCandidate};

/// Suffix of `name` starting at its last dot, dot included.
///
/// Returns `""` when the name has no dot.
pub fn extension_of(name: &str) -> &str {
    name.rfind('.').map_or("", |idx| &name[idx..])
}

/// Rejects extensions outside the configured allow-set.
pub struct ExtensionStage;

impl GateStage for ExtensionStage {
    fn name(&self) -> &str {
        "extension"
    }

    fn phase(&self) -> GatePhase {
        GatePhase::Admission
    }

    fn evaluate(
        &self,
        candidate: &UploadCandidate<'_>,
        config: &GateConfig,
    ) -> Result<(), GateError> {
        let extension = extension_of(candidate.name);
        if !config.allows_extension(extension) {
            return Err(GateError::UnsupportedExtension {
                extension: extension.to_string(),
                allowed: config.allowed_extensions.clone(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_includes_dot() {
        assert_eq!(extension_of("a.png"), ".png");
        assert_eq!(extension_of("archive.tar.gz"), ".gz");
        assert_eq!(extension_of("noext"), "");
        assert_eq!(extension_of("trailing."), ".");
    }

    #[test]
    fn allowed_extension_passes() {
        let config = GateConfig::new(1024, [".png"]);
        assert!(ExtensionStage
            .evaluate(&UploadCandidate::new("a.png", 0), &config)
            .is_ok());
    }

    #[test]
    fn unknown_extension_carries_allow_set() {
        let config = GateConfig::new(1024, [".png", ".jpg"]);
        let err = ExtensionStage
            .evaluate(&UploadCandidate::new("a.gif", 0), &config)
            .unwrap_err();
        match err {
            GateError::UnsupportedExtension { extension, allowed } => {
                assert_eq!(extension, ".gif");
                assert_eq!(allowed, config.allowed_extensions);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn missing_extension_rejected() {
        let config = GateConfig::new(1024, [".png"]);
        assert!(ExtensionStage
            .evaluate(&UploadCandidate::new("png", 0), &config)
            .is_err());
    }

    #[test]
    fn case_differs_rejected() {
        let config = GateConfig::new(1024, [".png"]);
        assert!(ExtensionStage
            .evaluate(&UploadCandidate::new("A.PNG", 0), &config)
            .is_err());
    }
}
