use std::io;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use bytes::Bytes;
use dedup_store::{DedupStore, StoreError, WriteSummary};
use futures::TryStreamExt;
use tokio_util::io::StreamReader;

use crate::error::ServerResult;

/// Shared handler state: the store is immutable after startup.
pub type AppState = Arc<DedupStore>;

/// `PUT /<resource>`: deduplicate the request body into the resource.
///
/// The body is consumed as a stream, never buffered whole. A client that
/// disconnects mid-upload surfaces as a stream error and aborts the write.
pub async fn put_resource(
    State(store): State<AppState>,
    Path(resource): Path<String>,
    body: Body,
) -> ServerResult<Json<WriteSummary>> {
    tracing::debug!(%resource, "received PUT");
    let stream = body.into_data_stream().map_err(io::Error::other);
    let summary = store.write(&resource, StreamReader::new(stream)).await?;
    Ok(Json(summary))
}

/// `GET /<resource>`: stream the stored records, one per line.
pub async fn get_resource(
    State(store): State<AppState>,
    Path(resource): Path<String>,
) -> ServerResult<Response> {
    tracing::debug!(%resource, "received GET");
    let records = store.read(&resource).await?;

    let lines = futures::stream::try_unfold(records, |mut records| async move {
        let Some(mut record) = records.next_record().await? else {
            tracing::info!(
                resource = %records.name(),
                records = records.delivered(),
                "served resource"
            );
            return Ok(None);
        };
        record.push(b'\n');
        Ok::<_, StoreError>(Some((Bytes::from(record), records)))
    })
    .inspect_err(|e| tracing::error!(error = %e, "resource stream failed"));

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(lines),
    )
        .into_response())
}
