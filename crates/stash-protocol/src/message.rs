use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest payload a single frame may carry.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Largest payload of a `ListResponse` frame. Listings are not paged, so
/// this bound is separate from [`MAX_MESSAGE_SIZE`].
pub const MAX_LIST_RESPONSE_SIZE: usize = 256 * 1024 * 1024;

/// Size of the data chunks the server streams on download. Clients should
/// upload in chunks of the same size; it is not enforced.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// All message types in the stash protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StashMessage {
    /// First frame of an upload: the target artifact name.
    UploadName { name: String },
    /// A slice of artifact bytes, in either direction.
    Chunk { data: Vec<u8> },
    /// Reply to a successful upload.
    UploadAck { name: String, size: u64 },
    DownloadRequest { name: String },
    ListRequest,
    ListResponse { files: Vec<FileEntry> },
    /// Terminal error. `code` is a [`crate::Code`] value.
    Error { code: u32, message: String },
}

/// One line of a listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    /// Absent when the server's storage cannot report creation time.
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl StashMessage {
    pub fn type_tag(&self) -> u8 {
        match self {
            Self::UploadName { .. } => 1,
            Self::Chunk { .. } => 2,
            Self::UploadAck { .. } => 3,
            Self::DownloadRequest { .. } => 4,
            Self::ListRequest => 5,
            Self::ListResponse { .. } => 6,
            Self::Error { .. } => 255,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::UploadName { .. } => "UploadName",
            Self::Chunk { .. } => "Chunk",
            Self::UploadAck { .. } => "UploadAck",
            Self::DownloadRequest { .. } => "DownloadRequest",
            Self::ListRequest => "ListRequest",
            Self::ListResponse { .. } => "ListResponse",
            Self::Error { .. } => "Error",
        }
    }

    /// Whether `tag` names a message this version understands.
    pub fn is_known_tag(tag: u8) -> bool {
        matches!(tag, 1..=6 | 255)
    }

    /// Payload bound for frames carrying `tag`.
    pub fn max_payload_size(tag: u8) -> usize {
        match tag {
            6 => MAX_LIST_RESPONSE_SIZE,
            _ => MAX_MESSAGE_SIZE,
        }
    }

    pub fn chunk(data: impl Into<Vec<u8>>) -> Self {
        Self::Chunk { data: data.into() }
    }
}
