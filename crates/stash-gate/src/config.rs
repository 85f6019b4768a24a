use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Limits applied to every upload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Largest accepted artifact, in bytes. An artifact of exactly this size passes.
    pub max_artifact_size: u64,
    /// Accepted extensions, e.g. `".png"`. Entries without a leading dot get one.
    pub allowed_extensions: BTreeSet<String>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            max_artifact_size: 10 * 1024 * 1024,
            allowed_extensions: [".png", ".jpg", ".jpeg"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl GateConfig {
    /// Build a config from a size limit and a list of extensions.
    pub fn new<I, S>(max_artifact_size: u64, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            max_artifact_size,
            allowed_extensions: extensions.into_iter().map(Into::into).collect(),
        }
        .normalized()
    }

    /// Return a copy whose extensions all start with a dot.
    pub fn normalized(mut self) -> Self {
        self.allowed_extensions = self
            .allowed_extensions
            .into_iter()
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if ext.starts_with('.') {
                    ext
                } else {
                    format!(".{ext}")
                }
            })
            .collect();
        self
    }

    /// Case-sensitive membership test against the allow-set.
    pub fn allows_extension(&self, extension: &str) -> bool {
        self.allowed_extensions.contains(extension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = GateConfig::default();
        assert_eq!(c.max_artifact_size, 10 * 1024 * 1024);
        assert!(c.allows_extension(".png"));
        assert!(!c.allows_extension(".gif"));
    }

    #[test]
    fn new_adds_leading_dot() {
        let c = GateConfig::new(1024, ["png", ".jpg", ""]);
        assert_eq!(c.allowed_extensions.len(), 2);
        assert!(c.allows_extension(".png"));
        assert!(c.allows_extension(".jpg"));
    }

    #[test]
    fn extension_match_is_case_sensitive() {
        let c = GateConfig::new(1024, [".png"]);
        assert!(!c.allows_extension(".PNG"));
    }

    #[test]
    fn deserializes_from_toml() {
        let c: GateConfig = toml::from_str(
            r#"
            max_artifact_size = 2048
            allowed_extensions = [".png", "webp"]
            "#,
        )
        .unwrap();
        let c = c.normalized();
        assert_eq!(c.max_artifact_size, 2048);
        assert!(c.allows_extension(".webp"));
    }
}
