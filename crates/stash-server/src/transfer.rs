use std::sync::Arc;

use futures_util::{Stream, StreamExt};
use stash_gate::{sanitize_name, GateError, UploadGate};
use stash_protocol::{ProtocolError, ProtocolResult, StashMessage, CHUNK_SIZE};
use stash_store::{Artifact, ArtifactStore};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::admission::{AdmissionController, AdmissionSlot};
use crate::error::{ServerError, ServerResult};

/// Progress of one upload.
///
/// `Start -> Validating -> Receiving -> Committing -> Done`, with `Aborted`
/// reachable from every state except `Done`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransferState {
    Start,
    Validating,
    Receiving,
    Committing,
    Done,
    Aborted,
}

impl TransferState {
    pub fn can_transition_to(self, next: TransferState) -> bool {
        use TransferState::*;
        match (self, next) {
            (Start, Validating)
            | (Validating, Receiving)
            | (Receiving, Committing)
            | (Committing, Done) => true,
            (Done | Aborted, Aborted) => false,
            (_, Aborted) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }
}

#[derive(Debug)]
struct UploadTracker {
    state: TransferState,
    artifact: String,
}

impl UploadTracker {
    fn new() -> Self {
        Self {
            state: TransferState::Start,
            artifact: String::new(),
        }
    }

    fn advance(&mut self, next: TransferState) -> ServerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(ServerError::InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        debug!(artifact = %self.artifact, from = ?self.state, to = ?next, "upload state");
        self.state = next;
        Ok(())
    }

    fn abort(&mut self) {
        if !self.state.is_terminal() {
            debug!(artifact = %self.artifact, from = ?self.state, "upload aborted");
            self.state = TransferState::Aborted;
        }
    }
}

/// Result of a committed upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadReceipt {
    pub name: String,
    pub size: u64,
}

/// Drives uploads, downloads and listings against one store.
pub struct TransferService<S: ArtifactStore> {
    store: Arc<S>,
    gate: Arc<UploadGate>,
    admission: Arc<AdmissionController>,
}

impl<S: ArtifactStore> Clone for TransferService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            gate: Arc::clone(&self.gate),
            admission: Arc::clone(&self.admission),
        }
    }
}

impl<S: ArtifactStore> TransferService<S> {
    pub fn new(store: S, gate: UploadGate, admission: AdmissionController) -> Self {
        Self {
            store: Arc::new(store),
            gate: Arc::new(gate),
            admission: Arc::new(admission),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn gate(&self) -> &UploadGate {
        &self.gate
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.admission
    }

    /// Receive an upload: an `UploadName` frame followed by `Chunk` frames.
    ///
    /// Every failure leaves neither a staging nor a committed entry. If the
    /// returned future is dropped mid-transfer the staging entry and the
    /// admission slot are released by their destructors.
    pub async fn upload<M>(&self, mut messages: M) -> ServerResult<UploadReceipt>
    where
        M: Stream<Item = ProtocolResult<StashMessage>> + Unpin + Send,
    {
        let _slot = self.admission.acquire_transfer().await?;
        let mut tracker = UploadTracker::new();

        let raw_name = match messages.next().await {
            Some(Ok(StashMessage::UploadName { name })) => name,
            Some(Ok(other)) => {
                tracker.abort();
                return Err(unexpected("UploadName", &other));
            }
            Some(Err(e)) => {
                tracker.abort();
                return Err(e.into());
            }
            None => {
                tracker.abort();
                return Err(ServerError::MissingFrame("UploadName"));
            }
        };

        tracker.advance(TransferState::Validating)?;
        let name = match self.gate.admit(&raw_name) {
            Ok(name) => name,
            Err(e) => {
                tracker.abort();
                return Err(e.into());
            }
        };
        tracker.artifact = name.clone();
        let mut staging = match self.store.begin_staging(&name).await {
            Ok(staging) => staging,
            Err(e) => {
                tracker.abort();
                return Err(e.into());
            }
        };

        tracker.advance(TransferState::Receiving)?;
        let size = match self.receive(&name, &mut staging, &mut messages).await {
            Ok(size) => size,
            Err(e) => {
                tracker.abort();
                if let Err(abort_err) = self.store.abort(staging).await {
                    warn!(artifact = %name, error = %abort_err, "failed to discard staging entry");
                }
                return Err(e);
            }
        };

        tracker.advance(TransferState::Committing)?;
        let artifact = match self.store.commit(staging).await {
            Ok(artifact) => artifact,
            Err(e) => {
                tracker.abort();
                return Err(e.into());
            }
        };
        tracker.advance(TransferState::Done)?;

        info!(artifact = %artifact.name, size, "upload completed");
        Ok(UploadReceipt {
            name: artifact.name,
            size,
        })
    }

    async fn receive<M>(
        &self,
        name: &str,
        staging: &mut S::Staging,
        messages: &mut M,
    ) -> ServerResult<u64>
    where
        M: Stream<Item = ProtocolResult<StashMessage>> + Unpin + Send,
    {
        let mut received: u64 = 0;
        while let Some(message) = messages.next().await {
            let data = match message? {
                StashMessage::Chunk { data } => data,
                other => return Err(unexpected("Chunk", &other)),
            };
            received += data.len() as u64;
            self.gate.check_progress(name, received)?;
            self.store.write_chunk(staging, &data).await?;
        }
        Ok(received)
    }

    /// Open an artifact for a chunked download.
    ///
    /// The returned stream holds a transfer slot until it finishes or is dropped.
    pub async fn download(&self, raw_name: &str) -> ServerResult<DownloadStream<S::Reader>> {
        let slot = self.admission.acquire_transfer().await?;
        let name = sanitize_name(raw_name);
        if name.is_empty() {
            return Err(GateError::EmptyName.into());
        }
        let reader = self.store.search(&name).await?;
        debug!(artifact = %name, "download started");
        Ok(DownloadStream {
            name,
            reader,
            sent: 0,
            finished: false,
            _slot: slot,
        })
    }

    /// Enumerate committed artifacts.
    pub async fn list(&self) -> ServerResult<Vec<Artifact>> {
        let _slot = self.admission.acquire_list().await?;
        let artifacts = self.store.list().await?;
        info!(count = artifacts.len(), "listed artifacts");
        Ok(artifacts)
    }
}

pub(crate) fn unexpected(expected: &'static str, got: &StashMessage) -> ServerError {
    ProtocolError::UnexpectedMessage {
        expected,
        got: got.type_name(),
    }
    .into()
}

/// An artifact being streamed out in `CHUNK_SIZE` pieces.
#[derive(Debug)]
pub struct DownloadStream<R> {
    name: String,
    reader: R,
    sent: u64,
    finished: bool,
    _slot: AdmissionSlot,
}

impl<R> DownloadStream<R>
where
    R: tokio::io::AsyncRead + Unpin,
{
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes handed out so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Read the next chunk. Every chunk but the last is exactly `CHUNK_SIZE`
    /// bytes; `None` marks the end.
    pub async fn next_chunk(&mut self) -> ServerResult<Option<Vec<u8>>> {
        if self.finished {
            return Ok(None);
        }
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut filled = 0;
        while filled < CHUNK_SIZE {
            let n = match self.reader.read(&mut buf[filled..]).await {
                Ok(n) => n,
                Err(e) => {
                    self.finished = true;
                    return Err(e.into());
                }
            };
            if n == 0 {
                self.finished = true;
                break;
            }
            filled += n;
        }
        if filled == 0 {
            info!(artifact = %self.name, size = self.sent, "download completed");
            return Ok(None);
        }
        buf.truncate(filled);
        self.sent += filled as u64;
        Ok(Some(buf))
    }
}
