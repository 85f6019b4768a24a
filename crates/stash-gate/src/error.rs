use std::collections::BTreeSet;

/// Reasons an upload is refused by the gate.
///
/// Every variant is safe to show to the caller verbatim.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GateError {
    /// The name is empty once directory components are stripped.
    #[error("filename is empty")]
    EmptyName,

    /// The extension is not in the configured allow-set.
    #[error("unsupported extension {extension:?}, available extensions: {}", display_set(.allowed))]
    UnsupportedExtension {
        extension: String,
        allowed: BTreeSet<String>,
    },

    /// The running byte count went past the configured maximum.
    #[error("artifact is too large, max size: {max} bytes")]
    SizeExceeded { max: u64 },
}

fn display_set(set: &BTreeSet<String>) -> String {
    set.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
}
