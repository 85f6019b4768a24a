//! Artifact server for stash.
//!
//! Accepts chunked uploads, serves chunked downloads and listings over HTTP,
//! with every request and response body carried as length-prefixed frames
//! (see `stash-protocol`). Uploads are validated by `stash-gate` and staged
//! in a `stash-store` backend until fully received.

pub mod admission;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod transfer;

pub use admission::{AdmissionController, AdmissionSlot};
pub use config::{LimitsConfig, ServerConfig, CONFIG_PATH_ENV};
pub use error::{status_response, ServerError, ServerResult};
pub use handler::AppState;
pub use server::StashServer;
pub use transfer::{DownloadStream, TransferService, TransferState, UploadReceipt};

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use stash_protocol::{
        endpoints, Code, FrameDecoder, InfoResponse, StashCodec, StashMessage, Status,
        CHUNK_SIZE,
    };
    use stash_store::{ArtifactStore, InMemoryArtifactStore};
    use tower::util::ServiceExt;

    fn app() -> Router {
        app_with(InMemoryArtifactStore::new())
    }

    fn app_with(store: InMemoryArtifactStore) -> Router {
        let mut config = ServerConfig::default();
        config.limits.max_artifact_size = 200_000;
        config.limits.allowed_extensions = [".png".to_string()].into();
        StashServer::with_store(config, store).unwrap().router()
    }

    fn download(name: &str) -> Request<Body> {
        post(
            endpoints::DOWNLOAD,
            &[StashMessage::DownloadRequest { name: name.into() }],
        )
    }

    fn post(uri: &str, msgs: &[StashMessage]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .body(Body::from(StashCodec::encode_all(msgs).unwrap()))
            .unwrap()
    }

    async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Vec<StashMessage>) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let mut decoder = FrameDecoder::new();
        decoder.extend(&body);
        let mut msgs = Vec::new();
        while let Some(msg) = decoder.next_message().unwrap() {
            msgs.push(msg);
        }
        decoder.finish().unwrap();
        (status, msgs)
    }

    fn upload_frames(name: &str, data: &[u8]) -> Vec<StashMessage> {
        let mut msgs = vec![StashMessage::UploadName { name: name.into() }];
        msgs.extend(data.chunks(CHUNK_SIZE).map(StashMessage::chunk));
        msgs
    }

    fn error_code(msgs: &[StashMessage]) -> Code {
        assert_eq!(msgs.len(), 1, "expected a single error frame");
        Status::from_message(&msgs[0]).unwrap().code()
    }

    #[tokio::test]
    async fn health_endpoint() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri(endpoints::HEALTH)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn info_endpoint() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri(endpoints::INFO)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let info: InfoResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(info.max_artifact_size, 200_000);
        assert_eq!(info.allowed_extensions, vec![".png".to_string()]);
        assert_eq!(info.chunk_size, CHUNK_SIZE);
    }

    #[tokio::test]
    async fn upload_download_list_round_trip() {
        let app = app();
        let data: Vec<u8> = (0..150_000u32).map(|i| (i * 7 % 256) as u8).collect();

        let frames = upload_frames("photos/cat.png", &data);
        let (status, reply) = call(&app, post(endpoints::UPLOAD, &frames)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            reply,
            vec![StashMessage::UploadAck {
                name: "cat.png".into(),
                size: data.len() as u64
            }]
        );

        let (status, frames) = call(&app, download("cat.png")).await;
        assert_eq!(status, StatusCode::OK);
        let mut downloaded = Vec::new();
        for frame in frames {
            match frame {
                StashMessage::Chunk { data } => downloaded.extend(data),
                other => panic!("unexpected frame {}", other.type_name()),
            }
        }
        assert_eq!(downloaded, data);

        let list = post(endpoints::LIST, &[StashMessage::ListRequest]);
        let (status, reply) = call(&app, list).await;
        assert_eq!(status, StatusCode::OK);
        match &reply[..] {
            [StashMessage::ListResponse { files }] => {
                assert_eq!(files.len(), 1);
                assert_eq!(files[0].name, "cat.png");
            }
            other => panic!("unexpected reply: {other:?}"),
        }
    }

    #[tokio::test]
    async fn duplicate_upload_is_conflict() {
        let app = app();
        let frames = upload_frames("a.png", b"first");
        let (status, _) = call(&app, post(endpoints::UPLOAD, &frames)).await;
        assert_eq!(status, StatusCode::OK);

        let (status, reply) = call(&app, post(endpoints::UPLOAD, &frames)).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(error_code(&reply), Code::AlreadyExists);
    }

    #[tokio::test]
    async fn rejected_uploads_are_invalid_argument() {
        let app = app();
        for frames in [
            upload_frames("a.gif", b"GIF89a"),
            upload_frames("", b"data"),
            upload_frames("big.png", &vec![0u8; 200_001]),
            vec![StashMessage::chunk(b"no name".to_vec())],
            Vec::new(),
        ] {
            let (status, reply) = call(&app, post(endpoints::UPLOAD, &frames)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(error_code(&reply), Code::InvalidArgument);
        }
        let (_, reply) = call(&app, post(endpoints::LIST, &[])).await;
        assert_eq!(reply, vec![StashMessage::ListResponse { files: Vec::new() }]);
    }

    #[tokio::test]
    async fn truncated_upload_body_is_rejected() {
        let app = app();
        let mut body = StashCodec::encode_all(&upload_frames("a.png", b"abc")).unwrap();
        body.truncate(body.len() - 1);
        let request = Request::builder()
            .method("POST")
            .uri(endpoints::UPLOAD)
            .body(Body::from(body))
            .unwrap();
        let (status, reply) = call(&app, request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&reply), Code::InvalidArgument);

        let (_, reply) = call(&app, post(endpoints::LIST, &[])).await;
        assert_eq!(reply, vec![StashMessage::ListResponse { files: Vec::new() }]);
    }

    #[tokio::test]
    async fn download_missing_is_not_found() {
        let (status, reply) = call(&app(), download("nope.png")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(error_code(&reply), Code::NotFound);
    }

    #[tokio::test]
    async fn download_requires_request_frame() {
        let (status, reply) = call(&app(), post(endpoints::DOWNLOAD, &[])).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_code(&reply), Code::InvalidArgument);

        let repeated = [StashMessage::ListRequest, StashMessage::ListRequest];
        let (status, _) = call(&app(), post(endpoints::LIST, &repeated)).await;
        assert_eq!(status, StatusCode::OK);

        let wrong = [StashMessage::DownloadRequest {
            name: "a.png".into(),
        }];
        let (status, _) = call(&app(), post(endpoints::LIST, &wrong)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn large_listing_is_served_in_one_frame() {
        let store = InMemoryArtifactStore::new();
        for i in 0..20_000 {
            let staging = store.begin_staging(&format!("img-{i:06}.png")).await.unwrap();
            store.commit(staging).await.unwrap();
        }
        let app = app_with(store);

        let list = post(endpoints::LIST, &[StashMessage::ListRequest]);
        let (status, reply) = call(&app, list).await;
        assert_eq!(status, StatusCode::OK);
        match &reply[..] {
            [StashMessage::ListResponse { files }] => {
                assert_eq!(files.len(), 20_000);
                assert!(files.iter().any(|f| f.name == "img-019999.png"));
            }
            other => panic!("unexpected reply of {} frames", other.len()),
        }
    }
}
