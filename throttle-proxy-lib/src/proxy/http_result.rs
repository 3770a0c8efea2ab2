use http::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// HTTP result type, T is typically a hyper::Response
/// HttpError is turned into a synthetic error response
pub type HttpResult<T> = std::result::Result<T, HttpError>;

/// Per-request failures after the admission decision
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("Failed to generate upstream request: {0}")]
    FailedToGenerateUpstreamRequest(String),

    #[error("Failed to get response from upstream: {0}")]
    FailedToGetResponseFromBackend(String),

    #[error("Upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("Rate limiter failure: {0}")]
    RateLimiterFailure(String),

    #[error("Failed to generate downstream response: {0}")]
    FailedToGenerateDownstreamResponse(String),
}

impl HttpError {
    /// Stable label used in metrics and logs.
    pub fn error_type(&self) -> &'static str {
        match self {
            HttpError::FailedToGenerateUpstreamRequest(_) => "upstream_request",
            HttpError::FailedToGetResponseFromBackend(_) => "upstream_unreachable",
            HttpError::UpstreamTimeout(_) => "upstream_timeout",
            HttpError::RateLimiterFailure(_) => "limiter_failure",
            HttpError::FailedToGenerateDownstreamResponse(_) => "downstream_response",
        }
    }

    /// True for failures reaching the upstream, answered with 502.
    pub fn is_upstream_failure(&self) -> bool {
        matches!(
            self,
            HttpError::FailedToGetResponseFromBackend(_) | HttpError::UpstreamTimeout(_)
        )
    }
}

impl From<HttpError> for StatusCode {
    fn from(e: HttpError) -> StatusCode {
        StatusCode::from(&e)
    }
}

impl From<&HttpError> for StatusCode {
    fn from(e: &HttpError) -> StatusCode {
        match e {
            HttpError::FailedToGetResponseFromBackend(_) | HttpError::UpstreamTimeout(_) => {
                StatusCode::BAD_GATEWAY
            }
            HttpError::FailedToGenerateUpstreamRequest(_)
            | HttpError::RateLimiterFailure(_)
            | HttpError::FailedToGenerateDownstreamResponse(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<crate::security::rate_limit::RateLimitError> for HttpError {
    fn from(e: crate::security::rate_limit::RateLimitError) -> Self {
        HttpError::RateLimiterFailure(e.to_string())
    }
}
