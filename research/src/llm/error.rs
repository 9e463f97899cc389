//! LlmClient error types

use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum LlmError {
    #[error("rate limited")]
    RateLimited,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("no more scripted responses")]
    Exhausted,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_is_human_readable() {
        assert_eq!(LlmError::RateLimited.to_string(), "rate limited");
        assert_eq!(LlmError::Provider("503".into()).to_string(), "provider error: 503");
    }
}
