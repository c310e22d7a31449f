use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;

use bytes::BufMut;
use futures_util::TryStreamExt;
use log::{error, info};
use serde_json::json;
use warp::http::StatusCode;
use warp::multipart::{FormData, Part};
use warp::reply::{Json, WithStatus};
use warp::{Filter, Rejection, Reply};

use crate::error::PipelineError;
use crate::pipeline::UploadedFile;
use crate::service::SharedService;

/// Multipart field carrying the upload
pub const FILE_FIELD: &str = "file";

type JsonReply = WithStatus<Json>;

fn json_error(status: StatusCode, message: &str) -> JsonReply {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
}

fn pipeline_error_reply(err: &PipelineError) -> JsonReply {
    match err {
        PipelineError::InvalidRequest(msg) => json_error(StatusCode::BAD_REQUEST, msg),
        PipelineError::UnsupportedMediaType(_) => {
            json_error(StatusCode::UNSUPPORTED_MEDIA_TYPE, &err.to_string())
        }
        _ => json_error(StatusCode::INTERNAL_SERVER_ERROR, &err.to_string()),
    }
}

async fn read_part(part: Part) -> Result<Vec<u8>, warp::Error> {
    part.stream()
        .try_fold(Vec::new(), |mut data, buf| async move {
            data.put(buf);
            Ok(data)
        })
        .await
}

/// Pull the `file` field out of a multipart form.
///
/// Parts without a filename are form values, not files, and are skipped.
async fn read_upload(mut form: FormData) -> Result<Option<UploadedFile>, warp::Error> {
    while let Some(part) = form.try_next().await? {
        if part.name() != FILE_FIELD {
            continue;
        }
        let Some(filename) = part.filename().map(str::to_string) else {
            continue;
        };
        let data = read_part(part).await?;
        return Ok(Some(UploadedFile::new(filename, data)));
    }
    Ok(None)
}

async fn handle_detect(form: FormData, service: SharedService) -> Result<JsonReply, Infallible> {
    let upload = match read_upload(form).await {
        Ok(Some(upload)) => upload,
        Ok(None) => return Ok(json_error(StatusCode::BAD_REQUEST, "No file uploaded")),
        Err(e) => {
            error!("Failed to read multipart upload: {}", e);
            return Ok(json_error(StatusCode::BAD_REQUEST, "No file uploaded"));
        }
    };

    if upload.filename.is_empty() {
        return Ok(json_error(StatusCode::BAD_REQUEST, "Empty filename"));
    }

    let filename = upload.filename.clone();
    let result = tokio::task::spawn_blocking(move || service.detect(&upload)).await;

    let reply = match result {
        Ok(Ok(outcome)) => warp::reply::with_status(warp::reply::json(&outcome), StatusCode::OK),
        Ok(Err(err)) => {
            if err.is_client_error() {
                info!("Rejected {}: {}", filename, err);
            } else {
                error!("Detection failed for {}: {}", filename, err);
            }
            pipeline_error_reply(&err)
        }
        Err(join_err) => {
            error!("Detection task for {} panicked: {}", filename, join_err);
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Detection task failed")
        }
    };
    Ok(reply)
}

async fn handle_history(service: SharedService) -> Result<Json, Infallible> {
    Ok(warp::reply::json(&service.history()))
}

async fn handle_rejection(err: Rejection) -> Result<JsonReply, Infallible> {
    let reply = if err.is_not_found() {
        json_error(StatusCode::NOT_FOUND, "Not found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        json_error(StatusCode::PAYLOAD_TOO_LARGE, "Upload too large")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        json_error(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    } else {
        // Anything else comes from the multipart filter
        json_error(StatusCode::BAD_REQUEST, "No file uploaded")
    };
    Ok(reply)
}

/// All HTTP routes: `POST /detect`, `GET /history` and `/static/*`.
pub fn routes(
    service: SharedService,
    static_root: PathBuf,
    max_upload_bytes: u64,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let service_filter = warp::any().map(move || service.clone());

    let detect = warp::path("detect")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::multipart::form().max_length(max_upload_bytes))
        .and(service_filter.clone())
        .and_then(handle_detect);

    let history = warp::path("history")
        .and(warp::path::end())
        .and(warp::get())
        .and(service_filter)
        .and_then(handle_history);

    let files = warp::path("static").and(warp::fs::dir(static_root));

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    detect
        .or(history)
        .or(files)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log("platescan::http"))
}

/// Serve until Ctrl+C
pub async fn serve(
    service: SharedService,
    addr: SocketAddr,
    static_root: PathBuf,
    max_upload_bytes: u64,
) -> anyhow::Result<()> {
    let (bound, server) = warp::serve(routes(service, static_root, max_upload_bytes))
        .try_bind_with_graceful_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })?;

    info!("Listening on http://{}", bound);
    server.await;
    Ok(())
}
