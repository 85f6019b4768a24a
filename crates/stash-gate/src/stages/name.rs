use crate::config::GateConfig;
use crate::error::GateError;
use crate::stage::{GatePhase, GateStage, UploadCandidate};

/// Reduce a client-supplied name to its final path component.
///
/// Both `/` and `\` count as separators. `"."` and `".."` are not names and
/// sanitize to the empty string, as does a separator-only input.
pub fn sanitize_name(raw: &str) -> String {
    let base = raw
        .trim_end_matches(['/', '\\'])
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();
    match base {
        "." | ".." => String::new(),
        other => other.to_string(),
    }
}

/// Rejects empty names.
pub struct NameStage;

impl GateStage for NameStage {
    fn name(&self) -> &str {
        "name"
    }

    fn phase(&self) -> GatePhase {
        GatePhase::Admission
    }

    fn evaluate(
        &self,
        candidate: &UploadCandidate<'_>,
        _config: &GateConfig,
    ) -> Result<(), GateError> {
        if candidate.name.is_empty() {
            return Err(GateError::EmptyName);
        }
        Ok(())
    }
}
