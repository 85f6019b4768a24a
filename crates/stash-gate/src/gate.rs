use tracing::debug;

use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{GatePhase, GateStage, UploadCandidate};
use crate::stages::{sanitize_name, ExtensionStage, NameStage, SizeStage};

/// The upload gate: an ordered pipeline of stages every upload passes through.
///
/// Admission stages run once when the name arrives; transfer stages run after
/// each chunk. Within a phase the pipeline is fail-fast: the first refusing
/// stage ends evaluation.
pub struct UploadGate {
    stages: Vec<Box<dyn GateStage>>,
    config: GateConfig,
}

impl UploadGate {
    /// Create a gate with no stages.
    pub fn new(config: GateConfig) -> Self {
        Self {
            stages: Vec::new(),
            config: config.normalized(),
        }
    }

    /// Create a gate with the standard pipeline:
    /// Name -> Extension (admission), Size (transfer).
    pub fn with_default_stages(config: GateConfig) -> Self {
        let mut gate = Self::new(config);
        gate.add_stage(Box::new(NameStage));
        gate.add_stage(Box::new(ExtensionStage));
        gate.add_stage(Box::new(SizeStage));
        gate
    }

    /// Append a stage to the end of the pipeline.
    pub fn add_stage(&mut self, stage: Box<dyn GateStage>) {
        self.stages.push(stage);
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Sanitize a raw name and run the admission stages on it.
    ///
    /// Returns the bare name the artifact will be stored under.
    pub fn admit(&self, raw_name: &str) -> Result<String, GateError> {
        let name = sanitize_name(raw_name);
        self.run_phase(GatePhase::Admission, &UploadCandidate::new(&name, 0))?;
        Ok(name)
    }

    /// Run the transfer stages against the running byte count.
    pub fn check_progress(&self, name: &str, received: u64) -> Result<(), GateError> {
        self.run_phase(GatePhase::Transfer, &UploadCandidate::new(name, received))
    }

    fn run_phase(
        &self,
        phase: GatePhase,
        candidate: &UploadCandidate<'_>,
    ) -> Result<(), GateError> {
        for stage in self.stages.iter().filter(|s| s.phase() == phase) {
            if let Err(err) = stage.evaluate(candidate, &self.config) {
                debug!(
                    stage = stage.name(),
                    artifact = candidate.name,
                    received = candidate.received,
                    reason = %err,
                    "gate stage refused upload"
                );
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for UploadGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("UploadGate")
            .field("stages", &names)
            .field("config", &self.config)
            .finish()
    }
}
