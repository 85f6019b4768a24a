use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use futures_util::{stream, StreamExt};
use stash_protocol::{
    FileEntry, HealthResponse, InfoResponse, MessageStream, StashCodec, StashMessage, CHUNK_SIZE,
    FRAME_CONTENT_TYPE, MAX_MESSAGE_SIZE, PROTOCOL_VERSION,
};
use stash_store::ArtifactStore;

use crate::error::{ServerError, ServerResult};
use crate::transfer::{unexpected, TransferService};

/// Shared state handed to every handler.
pub struct AppState<S: ArtifactStore> {
    pub transfers: TransferService<S>,
}

impl<S: ArtifactStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            transfers: self.transfers.clone(),
        }
    }
}

fn frame_response(msg: &StashMessage) -> ServerResult<Response> {
    let frame = StashCodec::encode(msg).map_err(|e| ServerError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, FRAME_CONTENT_TYPE)], frame).into_response())
}

/// First frame of a unary request body.
async fn first_message(body: Body) -> ServerResult<Option<StashMessage>> {
    let mut messages = MessageStream::new(body.into_data_stream());
    Ok(messages.next().await.transpose()?)
}

/// Upload handler: `UploadName` then `Chunk` frames in, one `UploadAck` out.
pub async fn upload_handler<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    body: Body,
) -> Result<Response, ServerError> {
    let messages = MessageStream::new(body.into_data_stream());
    let receipt = state.transfers.upload(messages).await?;
    frame_response(&StashMessage::UploadAck {
        name: receipt.name,
        size: receipt.size,
    })
}

/// Download handler: one `DownloadRequest` in, `Chunk` frames out.
///
/// A read failure after streaming began ends the body with an `Error` frame.
pub async fn download_handler<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    body: Body,
) -> Result<Response, ServerError> {
    let name = match first_message(body).await? {
        Some(StashMessage::DownloadRequest { name }) => name,
        Some(other) => return Err(unexpected("DownloadRequest", &other)),
        None => return Err(ServerError::MissingFrame("DownloadRequest")),
    };
    let download = state.transfers.download(&name).await?;

    let frames = stream::unfold(Some(download), |download| async move {
        let Some(mut download) = download else {
            return None;
        };
        match download.next_chunk().await {
            Ok(Some(data)) => Some((
                StashCodec::encode_bytes(&StashMessage::Chunk { data }),
                Some(download),
            )),
            Ok(None) => None,
            Err(e) => {
                let status = e.report();
                Some((StashCodec::encode_bytes(&status.to_message()), None))
            }
        }
    });
    Ok((
        [(header::CONTENT_TYPE, FRAME_CONTENT_TYPE)],
        Body::from_stream(frames),
    )
        .into_response())
}

/// List handler. The request body may be empty or a single `ListRequest`.
pub async fn list_handler<S: ArtifactStore>(
    State(state): State<AppState<S>>,
    body: Body,
) -> Result<Response, ServerError> {
    match first_message(body).await? {
        Some(StashMessage::ListRequest) | None => {}
        Some(other) => return Err(unexpected("ListRequest", &other)),
    }
    let files = state
        .transfers
        .list()
        .await?
        .into_iter()
        .map(|artifact| FileEntry {
            name: artifact.name,
            created_at: artifact.created_at,
            updated_at: artifact.updated_at,
        })
        .collect();
    frame_response(&StashMessage::ListResponse { files })
}

/// Health check handler.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::default())
}

/// Info handler: the limits uploads are checked against.
pub async fn info_handler<S: ArtifactStore>(
    State(state): State<AppState<S>>,
) -> Json<InfoResponse> {
    let config = state.transfers.gate().config();
    Json(InfoResponse {
        protocol_version: PROTOCOL_VERSION,
        max_artifact_size: config.max_artifact_size,
        allowed_extensions: config.allowed_extensions.iter().cloned().collect(),
        chunk_size: CHUNK_SIZE,
        max_message_size: MAX_MESSAGE_SIZE,
    })
}
