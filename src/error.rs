//! Error types for response capture and replay.

/// Errors raised while reading a response or replaying a captured one.
///
/// Capture-side variants never reach the caller of the interceptor: they are absorbed
/// into absent fields of the [`CapturedResponse`](crate::capture::CapturedResponse).
/// [`ResponseError::BodyNotCaptured`] is the one variant a caller can observe, when it
/// asks a [`ReplayableResponse`](crate::replay::ReplayableResponse) for a body that
/// could not be drained.
#[derive(Debug, thiserror::Error)]
pub enum ResponseError {
    #[error("Body stream error: {0}")]
    Stream(String),
    #[error("Body is not valid {charset}")]
    Decode { charset: &'static str },
    #[error("Response {field} unavailable: {reason}")]
    Unavailable { field: &'static str, reason: String },
    #[error("Response body was not captured and cannot be replayed")]
    BodyNotCaptured,
}

impl ResponseError {
    pub fn unavailable(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            field,
            reason: reason.into(),
        }
    }
}
