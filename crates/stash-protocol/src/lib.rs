//! Wire protocol for stash.
//!
//! Every request and response body is a sequence of length-prefixed frames:
//! `[4 bytes big-endian length][1 byte type tag][bincode payload]`, where the
//! length covers the tag and the payload. Uploads stream an `UploadName`
//! frame followed by `Chunk` frames; downloads stream `Chunk` frames back.
//! Failures travel as a terminal `Error` frame carrying a [`Code`].

pub mod codec;
pub mod endpoint;
pub mod error;
pub mod message;
pub mod status;

pub use codec::{FrameDecoder, MessageStream, StashCodec};
pub use endpoint::{endpoints, HealthResponse, InfoResponse, FRAME_CONTENT_TYPE};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    FileEntry, StashMessage, CHUNK_SIZE, MAX_LIST_RESPONSE_SIZE, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
pub use status::{Code, Status, INTERNAL_ERROR_MESSAGE};
