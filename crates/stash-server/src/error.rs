use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use stash_gate::GateError;
use stash_protocol::{Code, ProtocolError, StashCodec, Status, FRAME_CONTENT_TYPE};
use stash_store::StoreError;
use thiserror::Error;
use tracing::{error, info};

use crate::transfer::TransferState;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Gate(#[from] GateError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("request body ended before the {0} frame")]
    MissingFrame(&'static str),

    #[error("illegal transfer transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: TransferState,
        to: TransferState,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ServerResult<T> = Result<T, ServerError>;

impl ServerError {
    /// The caller-facing status. Anything not caused by the request itself
    /// collapses to an opaque internal error.
    pub fn status(&self) -> Status {
        match self {
            Self::Gate(e) => Status::invalid_argument(e.to_string()),
            Self::Store(StoreError::NotFound(name)) => {
                Status::not_found(format!("artifact {name:?} doesn't exist"))
            }
            Self::Store(StoreError::AlreadyExists(name)) => {
                Status::already_exists(format!("artifact {name:?} already exists"))
            }
            Self::Store(StoreError::InvalidName(name)) => {
                Status::invalid_argument(format!("invalid file name {name:?}"))
            }
            Self::Protocol(ProtocolError::Transport(_)) => Status::internal(),
            Self::Protocol(e) => Status::invalid_argument(e.to_string()),
            Self::MissingFrame(_) => Status::invalid_argument(self.to_string()),
            _ => Status::internal(),
        }
    }

    /// Log the failure with full detail and return what the caller may see.
    pub fn report(&self) -> Status {
        let status = self.status();
        if status.code() == Code::Internal {
            error!(error = %self, "request failed");
        } else {
            info!(code = %status.code(), error = %self, "request rejected");
        }
        status
    }
}

/// Response carrying `status` as a single `Error` frame.
pub fn status_response(status: &Status) -> Response {
    let code = StatusCode::from_u16(status.code().http_status())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    match StashCodec::encode(&status.to_message()) {
        Ok(frame) => (code, [(header::CONTENT_TYPE, FRAME_CONTENT_TYPE)], frame).into_response(),
        Err(_) => code.into_response(),
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        status_response(&self.report())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::*;

    #[test]
    fn validation_errors_are_invalid_argument() {
        let e = ServerError::from(GateError::SizeExceeded { max: 1024 });
        assert_eq!(e.status().code(), Code::InvalidArgument);
        assert!(e.status().message().contains("1024"));

        let e = ServerError::from(GateError::UnsupportedExtension {
            extension: ".gif".into(),
            allowed: BTreeSet::from([".png".to_string()]),
        });
        assert_eq!(e.status().code(), Code::InvalidArgument);
        assert!(e.status().message().contains(".png"));
    }

    #[test]
    fn store_conflicts_map_to_codes() {
        let e = ServerError::from(StoreError::AlreadyExists("a.png".into()));
        assert_eq!(e.status().code(), Code::AlreadyExists);
        let e = ServerError::from(StoreError::NotFound("a.png".into()));
        assert_eq!(e.status().code(), Code::NotFound);
    }

    #[test]
    fn io_detail_never_leaks() {
        let io = std::io::Error::other("disk on fire at /srv/stash/tmp/a.png");
        for e in [
            ServerError::from(StoreError::Io(io)),
            ServerError::Io(std::io::Error::other("/srv")),
            ServerError::Protocol(ProtocolError::Transport("connection reset".into())),
        ] {
            let status = e.status();
            assert_eq!(status.code(), Code::Internal);
            assert_eq!(status.message(), "internal error");
        }
    }

    #[test]
    fn malformed_frames_are_invalid_argument() {
        let e = ServerError::from(ProtocolError::UnexpectedMessage {
            expected: "UploadName",
            got: "Chunk",
        });
        assert_eq!(e.status().code(), Code::InvalidArgument);
        assert_eq!(
            ServerError::MissingFrame("UploadName").status().code(),
            Code::InvalidArgument
        );
    }

    #[test]
    fn response_carries_http_status_and_frame() {
        let response = ServerError::from(StoreError::NotFound("x.png".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            FRAME_CONTENT_TYPE
        );
    }
}
