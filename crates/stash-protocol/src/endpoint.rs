/// HTTP endpoint paths for the stash protocol.
pub mod endpoints {
    pub const UPLOAD: &str = "/v1/upload";
    pub const DOWNLOAD: &str = "/v1/download";
    pub const LIST: &str = "/v1/list";
    pub const HEALTH: &str = "/v1/health";
    pub const INFO: &str = "/v1/info";
}

/// Content type of framed request and response bodies.
pub const FRAME_CONTENT_TYPE: &str = "application/x-stash-frames";

/// Health check response.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub protocol_version: u32,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            protocol_version: super::message::PROTOCOL_VERSION,
        }
    }
}

/// Upload limits advertised to clients.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct InfoResponse {
    pub protocol_version: u32,
    pub max_artifact_size: u64,
    pub allowed_extensions: Vec<String>,
    pub chunk_size: usize,
    pub max_message_size: usize,
}
