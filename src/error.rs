//! Error taxonomy and API response classification.
//!
//! The API does not expose stable numeric sub-codes; non-2xx responses are
//! disambiguated by the HTTP status plus matching on the `error.code` and
//! `error.message` fields of the body. All of that matching lives in
//! [`classify`] so the wording table can be updated in one place when the
//! upstream phrasing changes.

use thiserror::Error;

const TRAINING_EXAMPLE_PREFIX: &str =
    "Expected file to have JSONL format with prompt/completion keys. Missing";
const ADDITIONAL_PROPERTIES_PREFIX: &str = "Additional properties are not allowed";
const NOT_ONE_OF_FRAGMENT: &str = "' is not one of [";
const BELOW_MINIMUM_FRAGMENT: &str = " is less than the minimum of ";
const ABOVE_MAXIMUM_FRAGMENT: &str = " is greater than the maximum of ";
const INVALID_VALUE_PREFIX: &str = "Invalid value for ";
const API_KEY_PREFIX: &str = "Incorrect API key provided: ";
const ORGANIZATION_PREFIX: &str = "No such organization: ";
const QUOTA_CODE: &str = "insufficient_quota";
const QUOTA_FRAGMENT: &str = "exceeded your current quota";
const RATE_LIMIT_CODE: &str = "rate_limit_exceeded";
const RATE_LIMIT_FRAGMENT: &str = "Rate limit reached";
const OVERLOADED_FRAGMENT: &str = "engine is currently overloaded";

/// Closed set of API error kinds produced by [`classify`].
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ApiErrorKind {
    /// Generic 4xx not otherwise classified.
    Request,
    /// 401 with a bad API key.
    InvalidApiKey,
    /// 401 naming an unknown organization.
    InvalidOrganization,
    /// Generic 401.
    Authorization,
    /// 404.
    NotFound,
    /// 400 rejecting a fine-tuning training file.
    InvalidTrainingExample,
    /// 400 rejecting an unknown request parameter.
    UnsupportedParameter,
    /// 400 rejecting a parameter value outside its allowed range or set.
    InvalidParameterValue,
    /// 429 from request-rate throttling; transient.
    RateLimit,
    /// 429 from an exhausted quota; terminal.
    QuotaExceeded,
    /// 429 while the serving engine is overloaded; transient.
    ApiOverloaded,
    /// Generic 429.
    TooManyRequests,
    /// 5xx other than 503, or an unparsable body.
    ServerError,
    /// 503.
    ServiceUnavailable,
}

impl ApiErrorKind {
    /// Kinds worth retrying with backoff. `QuotaExceeded` shares the 429
    /// status with these but never clears on its own, so it is terminal.
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimit | Self::ApiOverloaded | Self::ServiceUnavailable
        )
    }
}

impl std::fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Request => "bad request",
            Self::InvalidApiKey => "invalid api key",
            Self::InvalidOrganization => "invalid organization",
            Self::Authorization => "unauthorized",
            Self::NotFound => "not found",
            Self::InvalidTrainingExample => "invalid training example",
            Self::UnsupportedParameter => "unsupported parameter",
            Self::InvalidParameterValue => "invalid parameter value",
            Self::RateLimit => "rate limit",
            Self::QuotaExceeded => "quota exceeded",
            Self::ApiOverloaded => "api overloaded",
            Self::TooManyRequests => "too many requests",
            Self::ServerError => "server error",
            Self::ServiceUnavailable => "service unavailable",
        };
        f.write_str(label)
    }
}

/// A classified non-2xx API response.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
#[error("api error ({kind}): {message}")]
pub struct ApiError {
    /// Classified kind from the closed taxonomy.
    pub kind: ApiErrorKind,
    /// Human-readable message extracted from the body, or empty.
    pub message: String,
    /// Originating HTTP status; absent for errors signalled mid-stream.
    pub status: Option<u16>,
}

/// Transport-level failure. Never carries an HTTP status.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// Connection establishment timed out.
    #[error("connect timed out: {0}")]
    OpenTimeout(#[source] reqwest::Error),

    /// Reading the response body timed out.
    #[error("read timed out: {0}")]
    ReadTimeout(#[source] reqwest::Error),

    /// Sending the request body timed out.
    #[error("write timed out: {0}")]
    WriteTimeout(#[source] reqwest::Error),

    /// Overall request deadline elapsed.
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    /// Any other transport failure (reset, protocol error, DNS).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl NetworkError {
    /// Best-effort mapping of a `reqwest` failure onto the timeout
    /// sub-kinds; anything that is not a timeout stays `Transport`.
    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            if err.is_connect() {
                Self::OpenTimeout(err)
            } else if err.is_body() || err.is_decode() {
                Self::ReadTimeout(err)
            } else if err.is_request() {
                Self::WriteTimeout(err)
            } else {
                Self::Timeout(err)
            }
        } else {
            Self::Transport(err)
        }
    }
}

/// Errors produced by the SDK.
#[derive(Debug, Error)]
pub enum Error {
    /// Classified non-2xx API response.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Transport-level failure, distinct from an API-level error.
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Websocket transport error from a realtime session.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON encode/decode failure outside the lenient streaming path.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A required request parameter was missing or empty.
    #[error("missing required parameter: {0}")]
    MissingRequiredParameter(&'static str),

    /// Client construction or option validation failed.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A local file could not be opened for upload.
    #[error("cannot open file {path}: {source}")]
    FileCannotBeOpened {
        /// Path as given by the caller.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// A `.jsonl` upload failed local line-by-line validation.
    #[error("cannot parse JSONL file {path} at line {line}: {source}")]
    JsonlFileCannotBeParsed {
        /// Path as given by the caller.
        path: String,
        /// 1-based offending line number.
        line: usize,
        /// Parse failure for that line.
        #[source]
        source: serde_json::Error,
    },

    /// Outbound realtime queue is closed (session not connected or worker
    /// already shut down).
    #[error("send queue is closed")]
    SendQueueClosed,
}

impl Error {
    /// Whether the retry policy may re-issue the failed request.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(err) => err.kind.is_retryable(),
            _ => false,
        }
    }
}

/// Classifies a non-2xx response into an [`ApiError`].
///
/// Pure and infallible: a body that is not JSON, or lacks an
/// `error.message` field, degrades to an empty message and still goes
/// through the status dispatch.
pub fn classify(status: u16, body: &str) -> ApiError {
    let (message, code) = extract_error_fields(body);
    let kind = match status {
        400 => classify_bad_request(&message),
        401 => classify_unauthorized(&message),
        404 => ApiErrorKind::NotFound,
        429 => classify_too_many_requests(&message, code.as_deref()),
        503 => ApiErrorKind::ServiceUnavailable,
        500..=599 => ApiErrorKind::ServerError,
        _ => ApiErrorKind::Request,
    };

    ApiError {
        kind,
        message,
        status: Some(status),
    }
}

/// Classifies an `{"error": ...}` object delivered inside a 200 event
/// stream, where no failing status is available.
pub(crate) fn classify_stream_error(error: &serde_json::Value) -> ApiError {
    let message = error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    let code = error.get("code").and_then(serde_json::Value::as_str);
    let kind = classify_too_many_requests_strict(&message, code)
        .unwrap_or(ApiErrorKind::Request);

    ApiError {
        kind,
        message,
        status: None,
    }
}

fn classify_bad_request(message: &str) -> ApiErrorKind {
    if message.starts_with(TRAINING_EXAMPLE_PREFIX) {
        ApiErrorKind::InvalidTrainingExample
    } else if message.starts_with(ADDITIONAL_PROPERTIES_PREFIX) {
        ApiErrorKind::UnsupportedParameter
    } else if message.contains(NOT_ONE_OF_FRAGMENT)
        || message.contains(BELOW_MINIMUM_FRAGMENT)
        || message.contains(ABOVE_MAXIMUM_FRAGMENT)
        || message.starts_with(INVALID_VALUE_PREFIX)
    {
        ApiErrorKind::InvalidParameterValue
    } else {
        ApiErrorKind::Request
    }
}

fn classify_unauthorized(message: &str) -> ApiErrorKind {
    if message.starts_with(API_KEY_PREFIX) {
        ApiErrorKind::InvalidApiKey
    } else if message.starts_with(ORGANIZATION_PREFIX) {
        ApiErrorKind::InvalidOrganization
    } else {
        ApiErrorKind::Authorization
    }
}

fn classify_too_many_requests(message: &str, code: Option<&str>) -> ApiErrorKind {
    classify_too_many_requests_strict(message, code).unwrap_or(ApiErrorKind::TooManyRequests)
}

fn classify_too_many_requests_strict(message: &str, code: Option<&str>) -> Option<ApiErrorKind> {
    if code == Some(QUOTA_CODE) || message.contains(QUOTA_FRAGMENT) {
        Some(ApiErrorKind::QuotaExceeded)
    } else if code == Some(RATE_LIMIT_CODE) || message.contains(RATE_LIMIT_FRAGMENT) {
        Some(ApiErrorKind::RateLimit)
    } else if message.contains(OVERLOADED_FRAGMENT) {
        Some(ApiErrorKind::ApiOverloaded)
    } else {
        None
    }
}

/// Pulls `error.message` and `error.code` out of a response body.
///
/// Returns an empty message when the body is not JSON (an HTML error page,
/// a proxy banner) or does not carry the expected envelope.
fn extract_error_fields(body: &str) -> (String, Option<String>) {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return (String::new(), None);
    };
    let Some(error) = value.get("error") else {
        return (String::new(), None);
    };
    let message = error
        .get("message")
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();
    let code = error
        .get("code")
        .and_then(serde_json::Value::as_str)
        .map(str::to_string);
    (message, code)
}
