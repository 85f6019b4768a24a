//! Upload validation pipeline for stash.
//!
//! Every upload passes through the gate before its bytes are accepted and
//! again after every chunk. The checks are pure: no I/O, no shared state.
//!
//! # Quick Start
//!
//! ```rust
//! use stash_gate::{GateConfig, GateError, UploadGate};
//!
//! let gate = UploadGate::with_default_stages(GateConfig::new(1024, [".png"]));
//! let name = gate.admit("holiday/beach.png").unwrap();
//! assert_eq!(name, "beach.png");
//! assert!(gate.check_progress(&name, 1024).is_ok());
//! assert_eq!(
//!     gate.check_progress(&name, 1025),
//!     Err(GateError::SizeExceeded { max: 1024 })
//! );
//! ```

pub mod config;
pub mod error;
pub mod gate;
pub mod stage;
pub mod stages;

pub use config::GateConfig;
pub use error::GateError;
pub use gate::UploadGate;
pub use stage::{GatePhase, GateStage, UploadCandidate};
pub use stages::{
    check_size, extension_of, sanitize_name, ExtensionStage, NameStage, SizeStage,
};

#[cfg(test)]
mod tests {
    use super::*;

    fn png_gate(max: u64) -> UploadGate {
        UploadGate::with_default_stages(GateConfig::new(max, [".png"]))
    }

    #[test]
    fn default_gate_admits_valid_name() {
        let gate = png_gate(1024);
        assert_eq!(gate.stage_count(), 3);
        assert_eq!(gate.admit("a.png").unwrap(), "a.png");
    }

    #[test]
    fn admit_strips_directories() {
        let gate = png_gate(1024);
        assert_eq!(gate.admit("../../tmp/a.png").unwrap(), "a.png");
    }

    #[test]
    fn empty_name_fails_before_extension() {
        let gate = png_gate(1024);
        assert_eq!(gate.admit(""), Err(GateError::EmptyName));
        assert_eq!(gate.admit("/"), Err(GateError::EmptyName));
    }

    #[test]
    fn unsupported_extension_rejected() {
        let gate = png_gate(1024);
        assert!(matches!(
            gate.admit("a.gif"),
            Err(GateError::UnsupportedExtension { .. })
        ));
    }

    #[test]
    fn size_is_not_checked_at_admission() {
        let gate = png_gate(0);
        assert!(gate.admit("a.png").is_ok());
        assert!(gate.check_progress("a.png", 0).is_ok());
        assert!(gate.check_progress("a.png", 1).is_err());
    }

    #[test]
    fn admission_stages_not_run_on_progress() {
        let gate = png_gate(1024);
        // Name stages only run at admission; progress only sees the size stage.
        assert!(gate.check_progress("", 10).is_ok());
    }

    #[test]
    fn empty_pipeline_admits_anything() {
        let gate = UploadGate::new(GateConfig::new(0, [".png"]));
        assert_eq!(gate.admit("").unwrap(), "");
        assert!(gate.check_progress("", u64::MAX).is_ok());
    }

    #[test]
    fn custom_stage_integration() {
        struct NoSpaces;
        impl GateStage for NoSpaces {
            fn name(&self) -> &str {
                "no-spaces"
            }
            fn phase(&self) -> GatePhase {
                GatePhase::Admission
            }
            fn evaluate(
                &self,
                candidate: &UploadCandidate<'_>,
                _config: &GateConfig,
            ) -> Result<(), GateError> {
                if candidate.name.contains(' ') {
                    return Err(GateError::EmptyName);
                }
                Ok(())
            }
        }

        let mut gate = png_gate(1024);
        gate.add_stage(Box::new(NoSpaces));
        assert!(gate.admit("a b.png").is_err());
        assert!(gate.admit("ab.png").is_ok());
    }

    #[test]
    fn gate_normalizes_config() {
        let gate = UploadGate::with_default_stages(GateConfig {
            max_artifact_size: 1,
            allowed_extensions: ["png".to_string()].into(),
        });
        assert!(gate.admit("a.png").is_ok());
    }
}
