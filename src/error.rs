//! Service error taxonomy and the single place errors become responses.

use thiserror::Error;
use tracing::warn;

use crate::http::{Response, StatusCode};
use crate::store::StoreError;

/// Result type returned by every route handler.
pub type ApiResult = Result<Response, ApiError>;

/// Every failure a request can end in.
///
/// Handlers return these instead of building error responses themselves;
/// [`ApiError::into_response`] is the only translation to HTTP.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The requested resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The request was well-formed HTTP but its content is unusable.
    #[error("{0}")]
    InvalidInput(String),

    /// The request body has a media type the endpoint does not consume.
    #[error("content type [{0}] is not supported, expected text/plain")]
    UnsupportedMediaType(String),

    /// A failure inside the service that the caller cannot fix.
    #[error("{0}")]
    Internal(String),

    /// Anything else, typically a panic caught by the recovery middleware.
    #[error("unexpected error executing request : {0}")]
    Uncategorized(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NotFound,
            Self::InvalidInput(_) => StatusCode::UnprocessableEntity,
            Self::UnsupportedMediaType(_) => StatusCode::UnsupportedMediaType,
            Self::Internal(_) | Self::Uncategorized(_) => StatusCode::InternalServerError,
        }
    }

    /// Builds the `text/plain` response for this error.
    ///
    /// Server-side failures are logged here; client errors are not.
    pub fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();
        if matches!(self, Self::Internal(_) | Self::Uncategorized(_)) {
            warn!(status = status.as_u16(), error = %message, "request failed");
        }
        Response::text(status, message)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound(err.to_string()),
        }
    }
}

/// Collapses a handler result into the response that goes on the wire.
pub fn respond(result: ApiResult) -> Response {
    result.unwrap_or_else(ApiError::into_response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::headers::names;

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NotFound);
        assert_eq!(
            ApiError::InvalidInput("x".into()).status(),
            StatusCode::UnprocessableEntity
        );
        assert_eq!(
            ApiError::UnsupportedMediaType("application/json".into()).status(),
            StatusCode::UnsupportedMediaType
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::InternalServerError
        );
        assert_eq!(
            ApiError::Uncategorized("x".into()).status(),
            StatusCode::InternalServerError
        );
    }

    #[test]
    fn store_not_found_names_the_key() {
        let err: ApiError = StoreError::NotFound {
            gesture_type: "wave".into(),
        }
        .into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NotFound);
        assert_eq!(response.body_text(), "gesture type [wave] not found");
        assert_eq!(
            response.headers().get(names::CONTENT_TYPE),
            Some("text/plain; charset=utf-8")
        );
    }

    #[test]
    fn uncategorized_wraps_description() {
        let response = ApiError::Uncategorized("index out of bounds".into()).into_response();
        assert_eq!(
            response.body_text(),
            "unexpected error executing request : index out of bounds"
        );
    }

    #[test]
    fn respond_passes_success_through() {
        let ok = respond(Ok(Response::new(StatusCode::NoContent)));
        assert_eq!(ok.status(), StatusCode::NoContent);

        let failed = respond(Err(ApiError::InvalidInput("bad".into())));
        assert_eq!(failed.status(), StatusCode::UnprocessableEntity);
        assert_eq!(failed.body_text(), "bad");
    }
}
