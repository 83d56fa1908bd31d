use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;

use serde::Serialize;

pub async fn handler404(path: Uri) -> Error {
    Error::NotFound {
        message: format!("Invalid path: {}", path),
    }
}

#[derive(Debug)]
pub enum Error {
    NotFound { message: String },
    Query(anyhow::Error),
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match self {
            Error::NotFound { message } => {
                (StatusCode::NOT_FOUND, Json(ErrorBody { message })).into_response()
            }
            Error::Query(err) => {
                // The caller only ever sees the fixed message.
                log::error!("Error fetching students: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody {
                        message: "Server error while fetching students".to_string(),
                    }),
                )
                    .into_response()
            }
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Query(err)
    }
}
