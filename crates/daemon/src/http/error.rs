// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Ghostfleet Maintainers

//! Request error taxonomy mapped onto HTTP statuses.
//!
//! Raw upstream messages never leave unannotated; every adapter error is
//! wrapped with the operation that produced it before it gets here.

use crate::idle::IdleError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ghfleet_adapters::{CloudError, EngineError, SecretsError, SpawnError, WorkerError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

impl From<IdleError> for ApiError {
    fn from(e: IdleError) -> Self {
        match e {
            IdleError::UnknownServer(_) => Self::NotFound(e.to_string()),
            IdleError::NoInstanceId(_) => Self::BadRequest(e.to_string()),
            IdleError::StoppingInProgress
            | IdleError::AlreadyStopped(_)
            | IdleError::ActiveJobs(_) => Self::Conflict(e.to_string()),
            IdleError::Cloud(_) => Self::Upstream(e.to_string()),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<CloudError> for ApiError {
    fn from(e: CloudError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<WorkerError> for ApiError {
    fn from(e: WorkerError) -> Self {
        Self::Upstream(e.to_string())
    }
}

impl From<SpawnError> for ApiError {
    fn from(e: SpawnError) -> Self {
        Self::Internal(e.to_string())
    }
}

impl From<SecretsError> for ApiError {
    fn from(e: SecretsError) -> Self {
        match e {
            SecretsError::NotFound(_) => Self::NotFound(e.to_string()),
            SecretsError::Unauthorized => Self::Upstream(e.to_string()),
            SecretsError::Unavailable(_) => Self::Unavailable(e.to_string()),
        }
    }
}
