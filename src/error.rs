//! Error handling.

use axum::{
    extract::rejection::JsonRejection,
    http::header,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;
use tracing::{event, Level};

/// Aquaview server error type
///
/// This type encapsulates the various errors that may occur.
/// Each variant may result in a different API error response.
#[derive(Debug, Error)]
pub enum AquaviewError {
    /// Error reading the dataset file from storage
    #[error("failed to read dataset from {path}")]
    DatasetRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error deserialising the dataset file
    #[error("failed to decode dataset from {path}")]
    DatasetDecode {
        path: String,
        #[source]
        source: rmp_serde::decode::Error,
    },

    /// A record's start date does not follow the YYYY-MM-DD... layout
    #[error("invalid start date {value:?} in record {index}")]
    InvalidStartDate { index: usize, value: String },

    /// The configured image column is not part of the dataset schema
    #[error("dataset schema has no image column named {column}")]
    SchemaMismatch { column: String },

    /// The selection does not contain enough frames to animate
    #[error("need at least 2 frames to create an animation ({frames} selected)")]
    EmptySelection { frames: usize },

    /// Error decoding an embedded image
    #[error("failed to decode image for granule {granule}")]
    ImageDecode {
        granule: String,
        #[source]
        source: image::ImageError,
    },

    /// Error encoding the animation
    #[error("failed to encode animation")]
    AnimationEncode(#[from] image::ImageError),

    /// A background task building a derived artifact failed
    #[error("background task failed")]
    BlockingTask(#[from] tokio::task::JoinError),

    /// Error encoding the table as CSV
    #[error("failed to encode table as CSV")]
    CsvEncode(#[from] csv::Error),

    /// A preview request is inconsistent with the table dimensions
    #[error("preview request is not valid for this table")]
    PreviewOutOfBounds(#[source] validator::ValidationError),

    /// Error deserialising request data
    #[error("request data is not valid")]
    RequestDataJsonRejection(#[from] JsonRejection),

    /// Error validating request data (single error)
    #[error("request data is not valid")]
    RequestDataValidationSingle(#[from] validator::ValidationError),

    /// Error validating request data (multiple errors)
    #[error("request data is not valid")]
    RequestDataValidation(#[from] validator::ValidationErrors),
}

impl IntoResponse for AquaviewError {
    /// Convert from an `AquaviewError` into an [axum::response::Response].
    fn into_response(self) -> Response {
        ErrorResponse::from(self).into_response()
    }
}

/// Body of error response
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorBody {
    /// Main error message
    message: String,

    /// Optional list of causes
    #[serde(skip_serializing_if = "Option::is_none")]
    caused_by: Option<Vec<String>>,
}

impl ErrorBody {
    /// Return a new ErrorBody
    ///
    /// # Arguments
    ///
    /// * `error`: The error that occurred
    fn new<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        let message = error.to_string();
        let mut caused_by = None;
        let mut current = error.source();
        while let Some(source) = current {
            let mut causes: Vec<String> = caused_by.unwrap_or_default();
            causes.push(source.to_string());
            caused_by = Some(causes);
            current = source.source();
        }
        // Remove duplicate entries.
        if let Some(caused_by) = caused_by.as_mut() {
            caused_by.dedup()
        }
        ErrorBody { message, caused_by }
    }
}

/// A response to send in error cases
///
/// Implements serde (de)serialise.
#[derive(Deserialize, Serialize)]
struct ErrorResponse {
    /// HTTP status of the response
    #[serde(skip)]
    status: StatusCode,

    /// Response body
    error: ErrorBody,
}

impl ErrorResponse {
    /// Return a new ErrorResponse
    ///
    /// # Arguments
    ///
    /// * `status`: HTTP status of the response
    /// * `error`: The error that occurred. This will be formatted into a suitable `ErrorBody`
    fn new<E>(status: StatusCode, error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        ErrorResponse {
            status,
            error: ErrorBody::new(error),
        }
    }

    /// Return a 400 bad request ErrorResponse
    fn bad_request<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    /// Return a 500 internal server error ErrorResponse
    fn internal_server_error<E>(error: &E) -> Self
    where
        E: std::error::Error + Send + Sync,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error)
    }
}

impl From<AquaviewError> for ErrorResponse {
    /// Convert from an `AquaviewError` into an `ErrorResponse`.
    fn from(error: AquaviewError) -> Self {
        let response = match &error {
            // Bad request
            AquaviewError::EmptySelection { frames: _ }
            | AquaviewError::PreviewOutOfBounds(_)
            | AquaviewError::RequestDataJsonRejection(_)
            | AquaviewError::RequestDataValidationSingle(_)
            | AquaviewError::RequestDataValidation(_) => Self::bad_request(&error),

            // Internal server error
            AquaviewError::DatasetRead { .. }
            | AquaviewError::DatasetDecode { .. }
            | AquaviewError::InvalidStartDate { .. }
            | AquaviewError::SchemaMismatch { .. }
            | AquaviewError::ImageDecode { .. }
            | AquaviewError::AnimationEncode(_)
            | AquaviewError::BlockingTask(_)
            | AquaviewError::CsvEncode(_) => Self::internal_server_error(&error),
        };

        // Log server errors.
        if response.status.is_server_error() {
            event!(Level::ERROR, "{}", error.to_string());
            let mut current = error.source();
            while let Some(source) = current {
                event!(Level::ERROR, "Caused by: {}", source.to_string());
                current = source.source();
            }
        }

        response
    }
}

impl IntoResponse for ErrorResponse {
    /// Convert from an `ErrorResponse` into an `axum::response::Response`.
    ///
    /// Renders the response as JSON.
    fn into_response(self) -> Response {
        let json_body = serde_json::to_string_pretty(&self);
        match json_body {
            Err(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to serialise error response: {}", err),
            )
                .into_response(),
            Ok(json_body) => (
                self.status,
                [(&header::CONTENT_TYPE, mime::APPLICATION_JSON.to_string())],
                json_body,
            )
                .into_response(),
        }
    }
}
