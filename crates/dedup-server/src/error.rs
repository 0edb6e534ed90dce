use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dedup_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status reported for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Store(StoreError::BadInput(_)) => StatusCode::BAD_REQUEST,
            Self::Store(StoreError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Store(StoreError::InsufficientStorage { .. }) => StatusCode::INSUFFICIENT_STORAGE,
            Self::Store(
                StoreError::StreamRead(_)
                | StoreError::Publish { .. }
                | StoreError::ReadFailure(_)
                | StoreError::Internal(_),
            ) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "request rejected");
        }
        let reason = status.canonical_reason().unwrap_or("Error");
        (status, format!("{reason}\n")).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn io_err() -> io::Error {
        io::Error::new(io::ErrorKind::Other, "boom")
    }

    #[test]
    fn status_mapping() {
        let cases = [
            (ServerError::from(StoreError::BadInput("x".into())), 400),
            (ServerError::from(StoreError::NotFound("x".into())), 404),
            (
                ServerError::from(StoreError::InsufficientStorage {
                    context: "appending",
                    source: io_err(),
                }),
                507,
            ),
            (ServerError::from(StoreError::StreamRead(io_err())), 500),
            (
                ServerError::from(StoreError::Publish {
                    target: "t".into(),
                    source: io_err(),
                }),
                500,
            ),
            (ServerError::from(StoreError::ReadFailure(io_err())), 500),
            (ServerError::from(StoreError::Internal("x".into())), 500),
            (ServerError::Internal("x".into()), 500),
        ];
        for (err, code) in cases {
            assert_eq!(err.status().as_u16(), code, "{err}");
        }
    }

    #[test]
    fn response_carries_status() {
        let response = ServerError::from(StoreError::NotFound("r".into())).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn storage_exhaustion_is_507() {
        let err = StoreError::InsufficientStorage {
            context: "writing index marker",
            source: io::Error::new(io::ErrorKind::StorageFull, "no space left on device"),
        };
        let response = ServerError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::INSUFFICIENT_STORAGE);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"Insufficient Storage\n");
    }
}
