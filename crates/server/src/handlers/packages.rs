//! Package endpoints under `/capi/{api_key}`.

use crate::error::{ApiError, ApiResult, transport_code};
use crate::metrics;
use crate::package::{self, Package, PackageError};
use crate::state::AppState;
use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use depot_core::PackageId;
use depot_transport::TransportError;
use futures::StreamExt;
use serde::Serialize;
use std::time::Instant;
use tokio::io::AsyncWriteExt;

const BLOB_CONTENT_TYPE: &str = "application/x-xz";

/// Package metadata response.
#[derive(Debug, Serialize)]
pub struct PackageInfoResponse {
    pub package_id: String,
    pub owner_id: String,
    pub created_at: i64,
    pub expires_at: i64,
    pub export_path: String,
}

impl From<&Package> for PackageInfoResponse {
    fn from(package: &Package) -> Self {
        Self {
            package_id: package.id().to_string(),
            owner_id: package.owner_id.clone(),
            created_at: package.created_at,
            expires_at: package.expires_at,
            export_path: package.export_path(),
        }
    }
}

/// Import response.
#[derive(Debug, Serialize)]
pub struct AddPackageResponse {
    pub package_id: String,
    pub export_path: String,
    pub expires_at: i64,
}

/// Stream the local blob of `id` with its length.
async fn local_blob_response(state: &AppState, id: &PackageId) -> ApiResult<Response> {
    let blobs = &state.packages.blobs;
    let size = blobs.blob_size(id).await?;
    let stream = blobs
        .stream_blob(id, state.config.transport.chunk_size)
        .await?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, BLOB_CONTENT_TYPE.to_string()),
            (CONTENT_LENGTH, size.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response())
}

/// GET /capi/{api_key}/tran_pkg/{package_id} - Serve a local blob to a peer.
pub async fn transfer_package(
    State(state): State<AppState>,
    Path((_api_key, package_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let id = PackageId::new(package_id)?;
    let package = Package::get(id, state.packages.clone()).await?;

    let response = local_blob_response(&state, package.id()).await?;
    metrics::PEER_SERVES.inc();
    tracing::debug!(package_id = %package.id(), "Serving blob to peer");
    Ok(response)
}

/// GET /capi/{api_key}/get_pkg/{package_id} - Read a package, fetching it from a peer if needed.
///
/// A transferred blob is streamed while it is still being fetched, without
/// a length.
pub async fn get_package(
    State(state): State<AppState>,
    Path((_api_key, package_id)): Path<(String, String)>,
) -> ApiResult<Response> {
    let id = PackageId::new(package_id)?;

    match Package::get(id.clone(), state.packages.clone()).await {
        Ok(package) => {
            metrics::LOCAL_READS.inc();
            return local_blob_response(&state, package.id()).await;
        }
        Err(PackageError::NotFound(_)) => {}
        Err(e) => return Err(e.into()),
    }

    let package = Package::create(id, state.packages.clone());
    match package.transport().await {
        Ok(reader) => {
            metrics::TRANSPORT_READS.inc();
            let stream = reader.into_stream(state.config.transport.chunk_size);
            Ok((
                StatusCode::OK,
                [(CONTENT_TYPE, BLOB_CONTENT_TYPE)],
                Body::from_stream(stream),
            )
                .into_response())
        }
        // Registered between the lookup and the acquire.
        Err(TransportError::AlreadyLocal(id)) => {
            metrics::LOCAL_READS.inc();
            local_blob_response(&state, &id).await
        }
        Err(e) => {
            metrics::record_transport_error(transport_code(&e));
            Err(e.into())
        }
    }
}

/// GET /capi/{api_key}/pkg/{package_id} - Get package metadata.
pub async fn package_info(
    State(state): State<AppState>,
    Path((_api_key, package_id)): Path<(String, String)>,
) -> ApiResult<Json<PackageInfoResponse>> {
    let id = PackageId::new(package_id)?;
    let package = Package::get(id, state.packages.clone()).await?;
    Ok(Json(PackageInfoResponse::from(&package)))
}

/// DELETE /capi/{api_key}/pkg/{package_id} - Forget a package on this node.
pub async fn delete_package(
    State(state): State<AppState>,
    Path((_api_key, package_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let id = PackageId::new(package_id)?;
    package::clean(&id, &state.packages).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /capi/{api_key}/add_pkg - Import an uploaded archive under a fresh id.
///
/// The body is spooled to a temporary file next to the blobs, so large
/// archives are never held in memory.
pub async fn add_package(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
    req: Request,
) -> ApiResult<(StatusCode, Json<AddPackageResponse>)> {
    let upload = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(state.packages.blobs.root())
        .map_err(|e| ApiError::Internal(format!("failed to create upload file: {e}")))?;

    let mut file = tokio::fs::File::create(upload.path())
        .await
        .map_err(|e| ApiError::Internal(format!("failed to open upload file: {e}")))?;
    let mut body = req.into_body().into_data_stream();
    let mut received = 0u64;
    while let Some(chunk) = body.next().await {
        let chunk =
            chunk.map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        received += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| ApiError::Internal(format!("failed to write upload: {e}")))?;
    }
    file.flush()
        .await
        .map_err(|e| ApiError::Internal(format!("failed to write upload: {e}")))?;
    drop(file);

    if received == 0 {
        return Err(ApiError::BadRequest("empty upload".to_string()));
    }

    let mut package = Package::create(PackageId::generate(), state.packages.clone());
    let started = Instant::now();
    if let Err(e) = package.import(upload.path(), &api_key).await {
        metrics::PACKAGE_IMPORT_FAILURES.inc();
        return Err(e.into());
    }
    metrics::PACKAGE_IMPORT_DURATION.observe(started.elapsed().as_secs_f64());
    metrics::PACKAGES_IMPORTED.inc();

    Ok((
        StatusCode::CREATED,
        Json(AddPackageResponse {
            package_id: package.id().to_string(),
            export_path: package.export_path(),
            expires_at: package.expires_at,
        }),
    ))
}
